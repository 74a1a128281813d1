//! The veto escrow.
//!
//! An escrow starts as the signalling escrow, where holders lock stETH,
//! wstETH and withdrawal NFTs to voice opposition. Entering rage quit turns
//! it into a one-way exit: its stETH is converted to withdrawal requests in
//! batches, claimed, and paid out pro rata after an extension delay and the
//! withdrawals timelock.

use crate::accounting::{AssetsAccounting, HolderAssets, LockedAssetsTotals, UnstEthRecord};
use crate::batches_queue::WithdrawalsBatchesQueue;
use crate::error::EscrowError;
use crate::lido::{LedgerError, Lido, UnstEthId};
use dualgov_types::{Address, Duration, ETHValue, PercentD16, SharesValue, Timestamp, ValueError};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowState {
    SignallingEscrow,
    RageQuitEscrow,
}

/// Construction parameters shared by every escrow a governance deploys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscrowParams {
    pub min_assets_lock_duration: Duration,
    pub min_withdrawals_batch_size: usize,
}

/// Per-holder summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VetoerState {
    pub steth_locked_shares: SharesValue,
    pub unsteth_locked_shares: SharesValue,
    pub unsteth_ids_count: usize,
    pub last_assets_lock_timestamp: Timestamp,
}

#[derive(Clone, Debug)]
pub struct Escrow {
    address: Address,
    state: EscrowState,
    params: EscrowParams,
    accounting: AssetsAccounting,
    batches_queue: WithdrawalsBatchesQueue,
    rage_quit_extension_delay: Duration,
    rage_quit_withdrawals_timelock: Duration,
    rage_quit_extension_delay_started_at: Timestamp,
}

impl Escrow {
    pub fn new(address: Address, params: EscrowParams) -> Self {
        Self {
            address,
            state: EscrowState::SignallingEscrow,
            params,
            accounting: AssetsAccounting::new(),
            batches_queue: WithdrawalsBatchesQueue::new(),
            rage_quit_extension_delay: Duration::ZERO,
            rage_quit_withdrawals_timelock: Duration::ZERO,
            rage_quit_extension_delay_started_at: Timestamp::ZERO,
        }
    }

    // ── Signalling ─────────────────────────────────────────────────────

    /// Lock `amount` of the holder's stETH. Returns the locked shares.
    pub fn lock_steth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        amount: ETHValue,
        now: Timestamp,
    ) -> Result<SharesValue, EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        let shares = lido.shares_by_pooled_eth(amount)?;
        if shares.is_zero() {
            return Err(EscrowError::ZeroAmount);
        }
        check_balance(holder, shares, lido.shares_of(holder))?;
        self.accounting
            .account_steth_shares_lock(holder, shares, now)?;
        lido.transfer_shares(holder, &self.address, shares)?;
        tracing::debug!(escrow = %self.address, %holder, %shares, "stETH locked");
        Ok(shares)
    }

    /// Unlock every stETH share the holder locked. Returns the shares.
    pub fn unlock_steth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        now: Timestamp,
    ) -> Result<SharesValue, EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        self.accounting.check_min_assets_lock_duration_passed(
            holder,
            self.params.min_assets_lock_duration,
            now,
        )?;
        let shares = self.accounting.account_steth_shares_unlock(holder)?;
        lido.transfer_shares(&self.address, holder, shares)?;
        tracing::debug!(escrow = %self.address, %holder, %shares, "stETH unlocked");
        Ok(shares)
    }

    /// Lock wstETH. It is unwrapped on arrival and accounted as stETH shares.
    pub fn lock_wsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        amount: SharesValue,
        now: Timestamp,
    ) -> Result<SharesValue, EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        if amount.is_zero() {
            return Err(EscrowError::ZeroAmount);
        }
        check_balance(holder, amount, lido.wsteth_balance_of(holder))?;
        self.accounting
            .account_steth_shares_lock(holder, amount, now)?;
        lido.transfer_wsteth(holder, &self.address, amount)?;
        lido.unwrap_wsteth(&self.address, amount)?;
        tracing::debug!(escrow = %self.address, %holder, %amount, "wstETH locked");
        Ok(amount)
    }

    /// Unlock every share the holder locked, wrapped back into wstETH.
    pub fn unlock_wsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        now: Timestamp,
    ) -> Result<SharesValue, EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        self.accounting.check_min_assets_lock_duration_passed(
            holder,
            self.params.min_assets_lock_duration,
            now,
        )?;
        let shares = self.accounting.account_steth_shares_unlock(holder)?;
        lido.wrap_steth_shares(&self.address, shares)?;
        lido.transfer_wsteth(&self.address, holder, shares)?;
        tracing::debug!(escrow = %self.address, %holder, %shares, "wstETH unlocked");
        Ok(shares)
    }

    /// Lock withdrawal NFTs owned by the holder. None may be finalized.
    pub fn lock_unsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        ids: &[UnstEthId],
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            let status = lido.withdrawal_status(*id)?;
            if status.owner != *holder {
                return Err(LedgerError::NotRequestOwner {
                    id: *id,
                    caller: holder.clone(),
                }
                .into());
            }
            requests.push((*id, status));
        }
        self.accounting.account_unsteth_lock(holder, &requests, now)?;
        for id in ids {
            lido.transfer_request(holder, &self.address, *id)?;
        }
        tracing::debug!(escrow = %self.address, %holder, count = ids.len(), "unstETH locked");
        Ok(())
    }

    pub fn unlock_unsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        ids: &[UnstEthId],
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        self.accounting.check_min_assets_lock_duration_passed(
            holder,
            self.params.min_assets_lock_duration,
            now,
        )?;
        self.accounting.account_unsteth_unlock(holder, ids)?;
        for id in ids {
            lido.transfer_request(&self.address, holder, *id)?;
        }
        tracing::debug!(escrow = %self.address, %holder, count = ids.len(), "unstETH unlocked");
        Ok(())
    }

    /// Move locked NFTs that the queue has finalized from the unfinalized
    /// side of the support to the finalized side. Open to anyone.
    pub fn mark_unsteth_finalized<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        ids: &[UnstEthId],
    ) -> Result<(SharesValue, ETHValue), EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        let claimable = ids
            .iter()
            .map(|id| lido.claimable_ether(*id))
            .collect::<Result<Vec<_>, _>>()?;
        let (shares, eth) = self.accounting.account_unsteth_finalized(ids, &claimable)?;
        if !shares.is_zero() {
            tracing::debug!(escrow = %self.address, %shares, %eth, "unstETH marked finalized");
        }
        Ok((shares, eth))
    }

    /// Share of the stETH supply locked here, counting finalized NFTs by
    /// their claimable ether.
    pub fn rage_quit_support<L: Lido + ?Sized>(&self, lido: &L) -> Result<PercentD16, EscrowError> {
        let totals = self.accounting.locked_assets_totals();
        let locked_shares = totals
            .steth_locked_shares
            .checked_add(totals.unsteth_unfinalized_shares)?;
        let finalized = totals.unsteth_finalized_eth;
        let numerator = lido
            .pooled_eth_by_shares(locked_shares)?
            .checked_add(finalized)?;
        let denominator = lido.total_pooled_ether().checked_add(finalized)?;
        Ok(PercentD16::from_fraction(
            numerator.raw(),
            denominator.raw(),
        )?)
    }

    // ── Rage quit ──────────────────────────────────────────────────────

    /// Turn this escrow into a rage-quit escrow. Irreversible.
    pub fn start_rage_quit<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        extension_delay: Duration,
        withdrawals_timelock: Duration,
    ) -> Result<(), EscrowError> {
        self.check_state(EscrowState::SignallingEscrow)?;
        self.batches_queue.open(lido.last_request_id())?;
        self.state = EscrowState::RageQuitEscrow;
        self.rage_quit_extension_delay = extension_delay;
        self.rage_quit_withdrawals_timelock = withdrawals_timelock;
        tracing::info!(
            escrow = %self.address,
            %extension_delay,
            %withdrawals_timelock,
            "rage quit started"
        );
        Ok(())
    }

    /// Convert up to `batch_size` withdrawal requests worth of the escrow's
    /// stETH. Closes the queue once the remainder drops below the minimum
    /// request amount.
    pub fn request_next_withdrawals_batch<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        batch_size: usize,
    ) -> Result<Vec<UnstEthId>, EscrowError> {
        self.check_state(EscrowState::RageQuitEscrow)?;
        if batch_size < self.params.min_withdrawals_batch_size {
            return Err(EscrowError::BatchSizeTooSmall {
                size: batch_size,
                min: self.params.min_withdrawals_batch_size,
            });
        }
        if self.batches_queue.is_closed() {
            return Err(EscrowError::UnexpectedQueueState {
                expected: "opened",
                actual: self.batches_queue.state(),
            });
        }
        let min = lido.min_steth_withdrawal_amount();
        let max = lido.max_steth_withdrawal_amount();
        let balance = lido.balance_of(&self.address)?;
        if balance < min {
            self.batches_queue.close()?;
            tracing::info!(escrow = %self.address, "withdrawals batches queue closed");
            return Ok(Vec::new());
        }

        let cap = max.raw().saturating_mul(batch_size as u128);
        let amounts = split_into_requests(balance.raw().min(cap), min, max)?;
        let ids = lido.request_withdrawals(&self.address, &amounts)?;
        self.batches_queue.add_unsteth_ids(&ids)?;
        tracing::debug!(escrow = %self.address, requests = ids.len(), "withdrawals batch requested");

        if lido.balance_of(&self.address)? < min {
            self.batches_queue.close()?;
            tracing::info!(escrow = %self.address, "withdrawals batches queue closed");
        }
        Ok(ids)
    }

    /// Claim up to `max_count` of the escrow's own finalized requests.
    /// Starts the extension delay once the closed queue is fully claimed and
    /// every request up to the boundary id is finalized.
    pub fn claim_next_withdrawals_batch<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        max_count: usize,
        now: Timestamp,
    ) -> Result<ETHValue, EscrowError> {
        self.check_state(EscrowState::RageQuitEscrow)?;
        if !self.rage_quit_extension_delay_started_at.is_zero() {
            return Err(EscrowError::ExtensionDelayAlreadyStarted);
        }
        let ids = self.batches_queue.peek_next_batch(max_count)?;
        for id in &ids {
            let status = lido.withdrawal_status(*id)?;
            if !status.is_finalized || status.is_claimed {
                return Err(EscrowError::WithdrawalNotClaimable(*id));
            }
        }

        let mut claimed = ETHValue::ZERO;
        for id in &ids {
            claimed = claimed.checked_add(lido.claim_withdrawal(&self.address, *id)?)?;
        }
        self.batches_queue.claim_next_batch(max_count)?;
        self.accounting.account_claimed_steth(claimed)?;
        tracing::debug!(escrow = %self.address, count = ids.len(), %claimed, "withdrawals batch claimed");

        if self.batches_queue.is_closed()
            && self.batches_queue.is_all_batches_claimed()
            && lido.last_finalized_request_id() >= self.batches_queue.boundary_unsteth_id()
        {
            self.start_extension_delay(now);
        }
        Ok(claimed)
    }

    /// Start the extension delay explicitly, e.g. when the queue closed
    /// without producing any request.
    pub fn start_rage_quit_extension_delay<L: Lido + ?Sized>(
        &mut self,
        lido: &L,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        self.check_state(EscrowState::RageQuitEscrow)?;
        if !self.rage_quit_extension_delay_started_at.is_zero() {
            return Err(EscrowError::ExtensionDelayAlreadyStarted);
        }
        if !self.batches_queue.is_closed() {
            return Err(EscrowError::UnexpectedQueueState {
                expected: "closed",
                actual: self.batches_queue.state(),
            });
        }
        if !self.batches_queue.is_all_batches_claimed() {
            return Err(EscrowError::UnclaimedBatches {
                remaining: self.batches_queue.unclaimed_count(),
            });
        }
        let boundary = self.batches_queue.boundary_unsteth_id();
        let last_finalized = lido.last_finalized_request_id();
        if last_finalized < boundary {
            return Err(EscrowError::UnstEthNotFinalized {
                boundary,
                last_finalized,
            });
        }
        self.start_extension_delay(now);
        Ok(())
    }

    /// Claim finalized NFTs that holders locked during signalling.
    pub fn claim_unsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        ids: &[UnstEthId],
    ) -> Result<ETHValue, EscrowError> {
        self.check_state(EscrowState::RageQuitEscrow)?;
        let mut amounts = Vec::with_capacity(ids.len());
        for id in ids {
            let status = lido.withdrawal_status(*id)?;
            if !status.is_finalized {
                return Err(EscrowError::WithdrawalNotClaimable(*id));
            }
            amounts.push(lido.claimable_ether(*id)?);
        }
        let total = self.accounting.account_unsteth_claimed(ids, &amounts)?;
        for id in ids {
            lido.claim_withdrawal(&self.address, *id)?;
        }
        tracing::debug!(escrow = %self.address, count = ids.len(), %total, "unstETH claimed");
        Ok(total)
    }

    pub fn is_rage_quit_finalized(&self, now: Timestamp) -> bool {
        self.state == EscrowState::RageQuitEscrow
            && !self.rage_quit_extension_delay_started_at.is_zero()
            && self
                .rage_quit_extension_delay_started_at
                .has_passed(self.rage_quit_extension_delay, now)
    }

    /// Pay the holder's share of the claimed stETH ether.
    pub fn withdraw_eth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        now: Timestamp,
    ) -> Result<ETHValue, EscrowError> {
        self.check_state(EscrowState::RageQuitEscrow)?;
        self.check_withdrawals_timelock_passed(now)?;
        let eth = self.accounting.account_steth_shares_withdraw(holder)?;
        lido.transfer_eth(&self.address, holder, eth)?;
        tracing::info!(escrow = %self.address, %holder, %eth, "ETH withdrawn");
        Ok(eth)
    }

    /// Pay the holder the ether claimed for NFTs they locked.
    pub fn withdraw_eth_unsteth<L: Lido + ?Sized>(
        &mut self,
        lido: &mut L,
        holder: &Address,
        ids: &[UnstEthId],
        now: Timestamp,
    ) -> Result<ETHValue, EscrowError> {
        self.check_state(EscrowState::RageQuitEscrow)?;
        self.check_withdrawals_timelock_passed(now)?;
        let eth = self.accounting.account_unsteth_withdraw(holder, ids)?;
        lido.transfer_eth(&self.address, holder, eth)?;
        tracing::info!(escrow = %self.address, %holder, %eth, "unstETH ETH withdrawn");
        Ok(eth)
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn state(&self) -> EscrowState {
        self.state
    }

    pub fn params(&self) -> EscrowParams {
        self.params
    }

    pub fn locked_assets_totals(&self) -> LockedAssetsTotals {
        self.accounting.locked_assets_totals()
    }

    pub fn holder_assets(&self, holder: &Address) -> Option<&HolderAssets> {
        self.accounting.holder_assets(holder)
    }

    pub fn vetoer_state(&self, holder: &Address) -> VetoerState {
        self.accounting
            .holder_assets(holder)
            .map(|assets| VetoerState {
                steth_locked_shares: assets.steth_locked_shares,
                unsteth_locked_shares: assets.unsteth_locked_shares,
                unsteth_ids_count: assets.unsteth_ids.len(),
                last_assets_lock_timestamp: assets.last_assets_lock_timestamp,
            })
            .unwrap_or_default()
    }

    pub fn unsteth_record(&self, id: UnstEthId) -> Option<&UnstEthRecord> {
        self.accounting.unsteth_record(id)
    }

    pub fn batches_queue(&self) -> &WithdrawalsBatchesQueue {
        &self.batches_queue
    }

    pub fn rage_quit_extension_delay(&self) -> Duration {
        self.rage_quit_extension_delay
    }

    pub fn rage_quit_withdrawals_timelock(&self) -> Duration {
        self.rage_quit_withdrawals_timelock
    }

    pub fn rage_quit_extension_delay_started_at(&self) -> Timestamp {
        self.rage_quit_extension_delay_started_at
    }

    fn start_extension_delay(&mut self, now: Timestamp) {
        self.rage_quit_extension_delay_started_at = now;
        tracing::info!(escrow = %self.address, started_at = %now, "rage quit extension delay started");
    }

    fn check_withdrawals_timelock_passed(&self, now: Timestamp) -> Result<(), EscrowError> {
        let started = self.rage_quit_extension_delay_started_at;
        if started.is_zero() {
            return Err(EscrowError::WithdrawalsTimelockNotPassed {
                available_after: None,
            });
        }
        let total = self
            .rage_quit_extension_delay
            .checked_add(self.rage_quit_withdrawals_timelock)?;
        if !started.has_passed(total, now) {
            return Err(EscrowError::WithdrawalsTimelockNotPassed {
                available_after: Some(started.checked_add(total)?),
            });
        }
        Ok(())
    }

    fn check_state(&self, expected: EscrowState) -> Result<(), EscrowError> {
        if self.state != expected {
            return Err(EscrowError::UnexpectedEscrowState {
                escrow: self.address.clone(),
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

fn check_balance(
    holder: &Address,
    needed: SharesValue,
    available: SharesValue,
) -> Result<(), EscrowError> {
    if available < needed {
        return Err(LedgerError::InsufficientBalance {
            holder: holder.clone(),
            needed: needed.raw(),
            available: available.raw(),
        }
        .into());
    }
    Ok(())
}

/// Split `amount` into full `max` requests plus a remainder request when
/// the remainder reaches `min`.
fn split_into_requests(
    amount: u128,
    min: ETHValue,
    max: ETHValue,
) -> Result<Vec<ETHValue>, EscrowError> {
    if max.is_zero() {
        return Err(ValueError::DivisionByZero.into());
    }
    let full = amount / max.raw();
    let remainder = amount % max.raw();
    let mut amounts = vec![max; full as usize];
    if remainder >= min.raw() && remainder > 0 {
        amounts.push(ETHValue::new(remainder));
    }
    Ok(amounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_only_large_enough_remainders() {
        let min = ETHValue::new(100);
        let max = ETHValue::new(1_000);
        assert_eq!(
            split_into_requests(2_500, min, max).unwrap(),
            vec![max, max, ETHValue::new(500)]
        );
        assert_eq!(split_into_requests(2_050, min, max).unwrap(), vec![max, max]);
        assert!(split_into_requests(50, min, max).unwrap().is_empty());
    }

    #[test]
    fn fresh_escrow_is_signalling() {
        let escrow = Escrow::new(
            Address::new("escrow-0"),
            EscrowParams {
                min_assets_lock_duration: Duration::from_hours(5),
                min_withdrawals_batch_size: 4,
            },
        );
        assert_eq!(escrow.state(), EscrowState::SignallingEscrow);
        assert!(!escrow.is_rage_quit_finalized(Timestamp::MAX));
        assert_eq!(escrow.vetoer_state(&Address::new("alice")), VetoerState::default());
    }
}
