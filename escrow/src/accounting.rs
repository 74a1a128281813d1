//! Bookkeeping of the assets locked in an escrow.
//!
//! Every method validates its whole input before touching state, so a failed
//! call leaves the accounting unchanged.

use crate::error::EscrowError;
use crate::lido::{UnstEthId, WithdrawalRequestStatus};
use dualgov_types::{mul_div, Address, Duration, ETHValue, IndexOneBased, SharesValue, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StEthAccounting {
    pub locked_shares: SharesValue,
    /// Ether received for the escrow's own withdrawal batches.
    pub claimed_eth: ETHValue,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstEthAccounting {
    pub unfinalized_shares: SharesValue,
    pub finalized_eth: ETHValue,
}

/// Per-holder view of what they locked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderAssets {
    pub last_assets_lock_timestamp: Timestamp,
    pub steth_locked_shares: SharesValue,
    pub unsteth_locked_shares: SharesValue,
    pub unsteth_ids: Vec<UnstEthId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnstEthRecordStatus {
    Locked,
    Finalized,
    Claimed,
    Withdrawn,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstEthRecord {
    pub status: UnstEthRecordStatus,
    pub locked_by: Address,
    /// Position in the holder's `unsteth_ids`.
    pub index: IndexOneBased,
    pub shares: SharesValue,
    pub claimable_amount: ETHValue,
}

/// Aggregated totals, as exposed to the rage-quit support computation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockedAssetsTotals {
    pub steth_locked_shares: SharesValue,
    pub steth_claimed_eth: ETHValue,
    pub unsteth_unfinalized_shares: SharesValue,
    pub unsteth_finalized_eth: ETHValue,
}

#[derive(Clone, Debug, Default)]
pub struct AssetsAccounting {
    steth: StEthAccounting,
    unsteth: UnstEthAccounting,
    holders: HashMap<Address, HolderAssets>,
    records: HashMap<UnstEthId, UnstEthRecord>,
}

impl AssetsAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    // ── stETH ──────────────────────────────────────────────────────────

    pub fn account_steth_shares_lock(
        &mut self,
        holder: &Address,
        shares: SharesValue,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        if shares.is_zero() {
            return Err(EscrowError::ZeroAmount);
        }
        let total = self.steth.locked_shares.checked_add(shares)?;
        let holder_shares = self.steth_locked_shares_of(holder).checked_add(shares)?;
        let assets = self.holders.entry(holder.clone()).or_default();
        assets.steth_locked_shares = holder_shares;
        assets.last_assets_lock_timestamp = now;
        self.steth.locked_shares = total;
        Ok(())
    }

    /// Release every share `holder` locked and return their count.
    pub fn account_steth_shares_unlock(
        &mut self,
        holder: &Address,
    ) -> Result<SharesValue, EscrowError> {
        let shares = self.steth_locked_shares_of(holder);
        if shares.is_zero() {
            return Err(EscrowError::NoLockedShares {
                holder: holder.clone(),
            });
        }
        let total = self.steth.locked_shares.checked_sub(shares)?;
        if let Some(assets) = self.holders.get_mut(holder) {
            assets.steth_locked_shares = SharesValue::ZERO;
        }
        self.steth.locked_shares = total;
        Ok(shares)
    }

    /// Pay out the holder's pro-rata part of the claimed ether.
    ///
    /// The total locked shares are left untouched so later withdrawals keep
    /// the same ratio.
    pub fn account_steth_shares_withdraw(
        &mut self,
        holder: &Address,
    ) -> Result<ETHValue, EscrowError> {
        let shares = self.steth_locked_shares_of(holder);
        if shares.is_zero() {
            return Err(EscrowError::NothingToWithdraw {
                holder: holder.clone(),
            });
        }
        let eth = mul_div(
            self.steth.claimed_eth.raw(),
            shares.raw(),
            self.steth.locked_shares.raw(),
        )?;
        if let Some(assets) = self.holders.get_mut(holder) {
            assets.steth_locked_shares = SharesValue::ZERO;
        }
        Ok(ETHValue::new(eth))
    }

    pub fn account_claimed_steth(&mut self, eth: ETHValue) -> Result<(), EscrowError> {
        self.steth.claimed_eth = self.steth.claimed_eth.checked_add(eth)?;
        Ok(())
    }

    // ── unstETH ────────────────────────────────────────────────────────

    /// Record withdrawal requests locked by `holder`. Each request must be
    /// neither finalized nor claimed, and not already tracked.
    pub fn account_unsteth_lock(
        &mut self,
        holder: &Address,
        requests: &[(UnstEthId, WithdrawalRequestStatus)],
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        if requests.is_empty() {
            return Err(EscrowError::EmptyUnstEthIds);
        }
        let mut seen = HashSet::new();
        let mut added = SharesValue::ZERO;
        for (id, status) in requests {
            if !seen.insert(*id) {
                return Err(EscrowError::DuplicateUnstEthId(*id));
            }
            if status.is_finalized || status.is_claimed {
                return Err(EscrowError::UnstEthAlreadyFinalized(*id));
            }
            if self.records.contains_key(id) {
                return Err(EscrowError::UnstEthAlreadyLocked(*id));
            }
            added = added.checked_add(status.amount_of_shares)?;
        }
        let total = self.unsteth.unfinalized_shares.checked_add(added)?;
        let (holder_shares, first_index) = match self.holders.get(holder) {
            Some(assets) => (
                assets.unsteth_locked_shares.checked_add(added)?,
                assets.unsteth_ids.len(),
            ),
            None => (added, 0),
        };
        let mut records = Vec::with_capacity(requests.len());
        for (offset, (id, status)) in requests.iter().enumerate() {
            let record = UnstEthRecord {
                status: UnstEthRecordStatus::Locked,
                locked_by: holder.clone(),
                index: IndexOneBased::from_zero_based(first_index + offset)?,
                shares: status.amount_of_shares,
                claimable_amount: ETHValue::ZERO,
            };
            records.push((*id, record));
        }

        let assets = self.holders.entry(holder.clone()).or_default();
        for (id, record) in records {
            assets.unsteth_ids.push(id);
            self.records.insert(id, record);
        }
        assets.unsteth_locked_shares = holder_shares;
        assets.last_assets_lock_timestamp = now;
        self.unsteth.unfinalized_shares = total;
        Ok(())
    }

    /// Stop tracking requests `holder` locked. Only `Locked` or `Finalized`
    /// records can be released.
    pub fn account_unsteth_unlock(
        &mut self,
        holder: &Address,
        ids: &[UnstEthId],
    ) -> Result<(), EscrowError> {
        if ids.is_empty() {
            return Err(EscrowError::EmptyUnstEthIds);
        }
        let mut seen = HashSet::new();
        let mut unfinalized = SharesValue::ZERO;
        let mut finalized = ETHValue::ZERO;
        let mut holder_shares = SharesValue::ZERO;
        for id in ids {
            if !seen.insert(*id) {
                return Err(EscrowError::DuplicateUnstEthId(*id));
            }
            let record = self.owned_record(holder, *id)?;
            match record.status {
                UnstEthRecordStatus::Locked => {
                    unfinalized = unfinalized.checked_add(record.shares)?;
                }
                UnstEthRecordStatus::Finalized => {
                    finalized = finalized.checked_add(record.claimable_amount)?;
                }
                status => return Err(EscrowError::InvalidUnstEthStatus { id: *id, status }),
            }
            holder_shares = holder_shares.checked_add(record.shares)?;
        }
        let unfinalized_total = self.unsteth.unfinalized_shares.checked_sub(unfinalized)?;
        let finalized_total = self.unsteth.finalized_eth.checked_sub(finalized)?;
        let assets = self
            .holders
            .get_mut(holder)
            .ok_or(EscrowError::UnstEthNotLocked(ids[0]))?;
        let holder_total = assets.unsteth_locked_shares.checked_sub(holder_shares)?;

        for id in ids {
            if let Some(record) = self.records.remove(id) {
                let position = record.index.to_zero_based();
                assets.unsteth_ids.swap_remove(position);
                if let Some(moved) = assets.unsteth_ids.get(position) {
                    if let Some(moved_record) = self.records.get_mut(moved) {
                        moved_record.index = record.index;
                    }
                }
            }
        }
        assets.unsteth_locked_shares = holder_total;
        self.unsteth.unfinalized_shares = unfinalized_total;
        self.unsteth.finalized_eth = finalized_total;
        Ok(())
    }

    /// Move `Locked` records to `Finalized` with their claimable amounts.
    /// Unknown ids, zero amounts and records in any other status are
    /// skipped. Returns the shares and ether that changed sides.
    pub fn account_unsteth_finalized(
        &mut self,
        ids: &[UnstEthId],
        claimable: &[ETHValue],
    ) -> Result<(SharesValue, ETHValue), EscrowError> {
        let mut seen = HashSet::new();
        let mut shares = SharesValue::ZERO;
        let mut eth = ETHValue::ZERO;
        let mut updates = Vec::new();
        for (id, amount) in ids.iter().zip(claimable) {
            if amount.is_zero() || !seen.insert(*id) {
                continue;
            }
            let Some(record) = self.records.get(id) else {
                continue;
            };
            if record.status != UnstEthRecordStatus::Locked {
                continue;
            }
            shares = shares.checked_add(record.shares)?;
            eth = eth.checked_add(*amount)?;
            updates.push((*id, *amount));
        }
        let unfinalized_total = self.unsteth.unfinalized_shares.checked_sub(shares)?;
        let finalized_total = self.unsteth.finalized_eth.checked_add(eth)?;

        for (id, amount) in updates {
            if let Some(record) = self.records.get_mut(&id) {
                record.status = UnstEthRecordStatus::Finalized;
                record.claimable_amount = amount;
            }
        }
        self.unsteth.unfinalized_shares = unfinalized_total;
        self.unsteth.finalized_eth = finalized_total;
        Ok((shares, eth))
    }

    /// Mark locked requests as claimed by the escrow. A record finalized
    /// earlier must claim exactly its recorded amount.
    pub fn account_unsteth_claimed(
        &mut self,
        ids: &[UnstEthId],
        claimed: &[ETHValue],
    ) -> Result<ETHValue, EscrowError> {
        if ids.is_empty() {
            return Err(EscrowError::EmptyUnstEthIds);
        }
        let mut seen = HashSet::new();
        let mut total = ETHValue::ZERO;
        for (id, amount) in ids.iter().zip(claimed) {
            if !seen.insert(*id) {
                return Err(EscrowError::DuplicateUnstEthId(*id));
            }
            let record = self
                .records
                .get(id)
                .ok_or(EscrowError::UnstEthNotLocked(*id))?;
            match record.status {
                UnstEthRecordStatus::Locked => {}
                UnstEthRecordStatus::Finalized => {
                    if record.claimable_amount != *amount {
                        return Err(EscrowError::ClaimedAmountMismatch {
                            id: *id,
                            expected: record.claimable_amount.raw(),
                            actual: amount.raw(),
                        });
                    }
                }
                status => return Err(EscrowError::UnstEthAlreadyProcessed { id: *id, status }),
            }
            total = total.checked_add(*amount)?;
        }

        for (id, amount) in ids.iter().zip(claimed) {
            if let Some(record) = self.records.get_mut(id) {
                record.status = UnstEthRecordStatus::Claimed;
                record.claimable_amount = *amount;
            }
        }
        Ok(total)
    }

    /// Hand claimed ether back to the holder that locked the requests.
    pub fn account_unsteth_withdraw(
        &mut self,
        holder: &Address,
        ids: &[UnstEthId],
    ) -> Result<ETHValue, EscrowError> {
        if ids.is_empty() {
            return Err(EscrowError::EmptyUnstEthIds);
        }
        let mut seen = HashSet::new();
        let mut total = ETHValue::ZERO;
        for id in ids {
            if !seen.insert(*id) {
                return Err(EscrowError::DuplicateUnstEthId(*id));
            }
            let record = self.owned_record(holder, *id)?;
            match record.status {
                UnstEthRecordStatus::Claimed => {}
                UnstEthRecordStatus::Withdrawn => {
                    return Err(EscrowError::UnstEthAlreadyProcessed {
                        id: *id,
                        status: record.status,
                    })
                }
                status => return Err(EscrowError::InvalidUnstEthStatus { id: *id, status }),
            }
            total = total.checked_add(record.claimable_amount)?;
        }

        for id in ids {
            if let Some(record) = self.records.get_mut(id) {
                record.status = UnstEthRecordStatus::Withdrawn;
            }
        }
        Ok(total)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn locked_assets_totals(&self) -> LockedAssetsTotals {
        LockedAssetsTotals {
            steth_locked_shares: self.steth.locked_shares,
            steth_claimed_eth: self.steth.claimed_eth,
            unsteth_unfinalized_shares: self.unsteth.unfinalized_shares,
            unsteth_finalized_eth: self.unsteth.finalized_eth,
        }
    }

    pub fn holder_assets(&self, holder: &Address) -> Option<&HolderAssets> {
        self.holders.get(holder)
    }

    pub fn unsteth_record(&self, id: UnstEthId) -> Option<&UnstEthRecord> {
        self.records.get(&id)
    }

    /// Fails with a timing error until `min_lock_duration` has fully passed
    /// since the holder's last lock.
    pub fn check_min_assets_lock_duration_passed(
        &self,
        holder: &Address,
        min_lock_duration: Duration,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let last_lock = self
            .holders
            .get(holder)
            .map(|assets| assets.last_assets_lock_timestamp)
            .unwrap_or_default();
        if !last_lock.has_passed(min_lock_duration, now) {
            return Err(EscrowError::MinAssetsLockDurationNotPassed {
                holder: holder.clone(),
                unlock_available_at: last_lock.checked_add(min_lock_duration)?,
            });
        }
        Ok(())
    }

    fn steth_locked_shares_of(&self, holder: &Address) -> SharesValue {
        self.holders
            .get(holder)
            .map(|assets| assets.steth_locked_shares)
            .unwrap_or_default()
    }

    fn owned_record(&self, holder: &Address, id: UnstEthId) -> Result<&UnstEthRecord, EscrowError> {
        let record = self
            .records
            .get(&id)
            .ok_or(EscrowError::UnstEthNotLocked(id))?;
        if record.locked_by != *holder {
            return Err(EscrowError::UnstEthLockedByOther {
                id,
                holder: holder.clone(),
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::new("alice")
    }

    fn bob() -> Address {
        Address::new("bob")
    }

    fn request(owner: &Address, shares: u128) -> WithdrawalRequestStatus {
        WithdrawalRequestStatus {
            amount_of_steth: ETHValue::new(shares),
            amount_of_shares: SharesValue::new(shares),
            owner: owner.clone(),
            timestamp: Timestamp::ZERO,
            is_finalized: false,
            is_claimed: false,
        }
    }

    #[test]
    fn steth_lock_and_unlock_round_trip() {
        let mut acc = AssetsAccounting::new();
        let t = Timestamp::new(10);
        acc.account_steth_shares_lock(&alice(), SharesValue::new(100), t)
            .unwrap();
        acc.account_steth_shares_lock(&alice(), SharesValue::new(50), t)
            .unwrap();
        acc.account_steth_shares_lock(&bob(), SharesValue::new(10), t)
            .unwrap();
        assert_eq!(
            acc.locked_assets_totals().steth_locked_shares,
            SharesValue::new(160)
        );

        let unlocked = acc.account_steth_shares_unlock(&alice()).unwrap();
        assert_eq!(unlocked, SharesValue::new(150));
        assert_eq!(
            acc.locked_assets_totals().steth_locked_shares,
            SharesValue::new(10)
        );
        assert!(matches!(
            acc.account_steth_shares_unlock(&alice()),
            Err(EscrowError::NoLockedShares { .. })
        ));
    }

    #[test]
    fn zero_share_lock_is_rejected() {
        let mut acc = AssetsAccounting::new();
        assert_eq!(
            acc.account_steth_shares_lock(&alice(), SharesValue::ZERO, Timestamp::ZERO),
            Err(EscrowError::ZeroAmount)
        );
        assert!(acc.holder_assets(&alice()).is_none());
    }

    #[test]
    fn withdrawals_are_pro_rata_and_one_shot() {
        let mut acc = AssetsAccounting::new();
        acc.account_steth_shares_lock(&alice(), SharesValue::new(300), Timestamp::ZERO)
            .unwrap();
        acc.account_steth_shares_lock(&bob(), SharesValue::new(100), Timestamp::ZERO)
            .unwrap();
        acc.account_claimed_steth(ETHValue::new(800)).unwrap();

        assert_eq!(
            acc.account_steth_shares_withdraw(&alice()).unwrap(),
            ETHValue::new(600)
        );
        assert_eq!(
            acc.account_steth_shares_withdraw(&bob()).unwrap(),
            ETHValue::new(200)
        );
        assert!(acc.account_steth_shares_withdraw(&alice()).is_err());
    }

    #[test]
    fn unsteth_unlock_keeps_indices_consistent() {
        let mut acc = AssetsAccounting::new();
        let requests: Vec<_> = (1..=4).map(|id| (id, request(&alice(), 10))).collect();
        acc.account_unsteth_lock(&alice(), &requests, Timestamp::ZERO)
            .unwrap();

        acc.account_unsteth_unlock(&alice(), &[1]).unwrap();
        let assets = acc.holder_assets(&alice()).unwrap();
        assert_eq!(assets.unsteth_ids, vec![4, 2, 3]);
        for (position, id) in assets.unsteth_ids.iter().enumerate() {
            let record = acc.unsteth_record(*id).unwrap();
            assert_eq!(record.index.to_zero_based(), position);
        }
        assert_eq!(assets.unsteth_locked_shares, SharesValue::new(30));
        assert_eq!(
            acc.locked_assets_totals().unsteth_unfinalized_shares,
            SharesValue::new(30)
        );
    }

    #[test]
    fn failed_unlock_changes_nothing() {
        let mut acc = AssetsAccounting::new();
        acc.account_unsteth_lock(&alice(), &[(1, request(&alice(), 10))], Timestamp::ZERO)
            .unwrap();
        acc.account_unsteth_lock(&bob(), &[(2, request(&bob(), 10))], Timestamp::ZERO)
            .unwrap();

        let err = acc.account_unsteth_unlock(&alice(), &[1, 2]).unwrap_err();
        assert!(matches!(err, EscrowError::UnstEthLockedByOther { id: 2, .. }));
        assert!(acc.unsteth_record(1).is_some());
        assert_eq!(
            acc.locked_assets_totals().unsteth_unfinalized_shares,
            SharesValue::new(20)
        );
    }

    #[test]
    fn finalized_records_move_between_totals() {
        let mut acc = AssetsAccounting::new();
        let requests = [(1, request(&alice(), 10)), (2, request(&alice(), 20))];
        acc.account_unsteth_lock(&alice(), &requests, Timestamp::ZERO)
            .unwrap();

        let (shares, eth) = acc
            .account_unsteth_finalized(&[1, 2, 9], &[ETHValue::new(11), ETHValue::ZERO, ETHValue::new(5)])
            .unwrap();
        assert_eq!(shares, SharesValue::new(10));
        assert_eq!(eth, ETHValue::new(11));

        let totals = acc.locked_assets_totals();
        assert_eq!(totals.unsteth_unfinalized_shares, SharesValue::new(20));
        assert_eq!(totals.unsteth_finalized_eth, ETHValue::new(11));
        assert_eq!(
            acc.unsteth_record(1).unwrap().status,
            UnstEthRecordStatus::Finalized
        );
        assert_eq!(
            acc.unsteth_record(2).unwrap().status,
            UnstEthRecordStatus::Locked
        );
    }

    #[test]
    fn claimed_then_withdrawn_once() {
        let mut acc = AssetsAccounting::new();
        acc.account_unsteth_lock(&alice(), &[(1, request(&alice(), 10))], Timestamp::ZERO)
            .unwrap();
        acc.account_unsteth_finalized(&[1], &[ETHValue::new(12)])
            .unwrap();
        assert!(matches!(
            acc.account_unsteth_claimed(&[1], &[ETHValue::new(13)]),
            Err(EscrowError::ClaimedAmountMismatch { .. })
        ));
        acc.account_unsteth_claimed(&[1], &[ETHValue::new(12)])
            .unwrap();
        assert!(matches!(
            acc.account_unsteth_withdraw(&bob(), &[1]),
            Err(EscrowError::UnstEthLockedByOther { .. })
        ));
        assert_eq!(
            acc.account_unsteth_withdraw(&alice(), &[1]).unwrap(),
            ETHValue::new(12)
        );
        let err = acc.account_unsteth_withdraw(&alice(), &[1]).unwrap_err();
        assert_eq!(err.kind(), dualgov_types::ErrorKind::Replay);
    }

    #[test]
    fn lock_duration_check_uses_strict_comparison() {
        let mut acc = AssetsAccounting::new();
        let locked_at = Timestamp::new(100);
        acc.account_steth_shares_lock(&alice(), SharesValue::new(1), locked_at)
            .unwrap();
        let min = Duration::from_hours(5);
        let boundary = locked_at.checked_add(min).unwrap();
        assert!(acc
            .check_min_assets_lock_duration_passed(&alice(), min, boundary)
            .is_err());
        assert!(acc
            .check_min_assets_lock_duration_passed(
                &alice(),
                min,
                Timestamp::new(boundary.as_secs() + 1)
            )
            .is_ok());
    }
}
