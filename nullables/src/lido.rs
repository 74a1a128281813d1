//! In-memory stETH, wstETH, withdrawal queue and ether ledger.
//!
//! Behaves like the real protocol where the engine can observe it: share
//! rate conversions, sequential withdrawal request ids, finalization in id
//! order and one-shot claims. Rebases are driven explicitly by the test.

use dualgov_escrow::{
    EtherLedger, LedgerError, StEthToken, UnstEthId, WithdrawalQueue, WithdrawalRequestStatus,
    WstEthToken,
};
use dualgov_types::{Address, ETHValue, SharesValue, Timestamp};
use std::collections::HashMap;

/// 100 wei.
pub const DEFAULT_MIN_WITHDRAWAL: ETHValue = ETHValue::new(100);
/// 1000 ether.
pub const DEFAULT_MAX_WITHDRAWAL: ETHValue = ETHValue::new(1_000 * 10u128.pow(18));

const QUEUE_ADDRESS: &str = "withdrawal-queue";

#[derive(Clone, Debug)]
struct Request {
    amount_of_steth: ETHValue,
    amount_of_shares: SharesValue,
    owner: Address,
    timestamp: Timestamp,
    claimable: ETHValue,
    is_finalized: bool,
    is_claimed: bool,
}

/// A deterministic stand-in for the Lido contracts.
#[derive(Clone, Debug)]
pub struct NullLido {
    total_pooled_ether: ETHValue,
    total_shares: SharesValue,
    shares: HashMap<Address, SharesValue>,
    wsteth: HashMap<Address, SharesValue>,
    eth: HashMap<Address, ETHValue>,
    requests: Vec<Request>,
    last_finalized: UnstEthId,
    min_withdrawal: ETHValue,
    max_withdrawal: ETHValue,
    now: Timestamp,
    queue: Address,
}

impl NullLido {
    pub fn new() -> Self {
        Self::with_withdrawal_limits(DEFAULT_MIN_WITHDRAWAL, DEFAULT_MAX_WITHDRAWAL)
    }

    pub fn with_withdrawal_limits(min: ETHValue, max: ETHValue) -> Self {
        Self {
            total_pooled_ether: ETHValue::ZERO,
            total_shares: SharesValue::ZERO,
            shares: HashMap::new(),
            wsteth: HashMap::new(),
            eth: HashMap::new(),
            requests: Vec::new(),
            last_finalized: 0,
            min_withdrawal: min,
            max_withdrawal: max,
            now: Timestamp::ZERO,
            queue: Address::new(QUEUE_ADDRESS),
        }
    }

    /// Stamp subsequent withdrawal requests with `now`.
    pub fn set_time(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Deposit ether on behalf of `holder`, minting stETH at the current
    /// share rate. Returns the minted shares.
    pub fn submit(&mut self, holder: &Address, eth: ETHValue) -> SharesValue {
        let shares = if self.total_shares.is_zero() {
            SharesValue::new(eth.raw())
        } else {
            self.shares_by_pooled_eth(eth).unwrap_or_default()
        };
        self.total_pooled_ether = ETHValue::new(self.total_pooled_ether.raw() + eth.raw());
        self.total_shares = SharesValue::new(self.total_shares.raw() + shares.raw());
        credit_shares(&mut self.shares, holder, shares);
        shares
    }

    /// Deposit ether and hand it out as wstETH.
    pub fn submit_wsteth(&mut self, holder: &Address, eth: ETHValue) -> SharesValue {
        let shares = self.submit(holder, eth);
        debit_shares(&mut self.shares, holder, shares);
        credit_shares(&mut self.wsteth, holder, shares);
        shares
    }

    /// Change the ether backing all shares, as an oracle report would.
    pub fn rebase(&mut self, total_pooled_ether: ETHValue) {
        self.total_pooled_ether = total_pooled_ether;
    }

    /// Give `holder` plain ether.
    pub fn credit_eth(&mut self, holder: &Address, eth: ETHValue) {
        let balance = self.eth.entry(holder.clone()).or_default();
        *balance = ETHValue::new(balance.raw() + eth.raw());
    }

    /// Finalize every pending request up to and including `id`, burning the
    /// queue's shares at the current rate. Requests never pay out more than
    /// their requested stETH amount.
    pub fn finalize(&mut self, id: UnstEthId) {
        let up_to = id.min(self.requests.len() as UnstEthId);
        for next in self.last_finalized + 1..=up_to {
            let index = (next - 1) as usize;
            let shares = self.requests[index].amount_of_shares;
            let at_rate = self.pooled_eth_by_shares(shares).unwrap_or_default();
            let claimable = at_rate.min(self.requests[index].amount_of_steth);

            debit_shares(&mut self.shares, &self.queue, shares);
            self.total_shares = SharesValue::new(self.total_shares.raw() - shares.raw());
            self.total_pooled_ether =
                ETHValue::new(self.total_pooled_ether.raw().saturating_sub(at_rate.raw()));
            let queue = self.queue.clone();
            self.credit_eth(&queue, claimable);

            let request = &mut self.requests[index];
            request.claimable = claimable;
            request.is_finalized = true;
        }
        self.last_finalized = self.last_finalized.max(up_to);
    }

    /// Finalize everything requested so far.
    pub fn finalize_all(&mut self) {
        self.finalize(self.requests.len() as UnstEthId);
    }

    pub fn request_owner(&self, id: UnstEthId) -> Option<&Address> {
        self.request(id).ok().map(|request| &request.owner)
    }

    fn request(&self, id: UnstEthId) -> Result<&Request, LedgerError> {
        id.checked_sub(1)
            .and_then(|index| self.requests.get(index as usize))
            .ok_or(LedgerError::UnknownRequest(id))
    }

    fn request_mut(&mut self, id: UnstEthId) -> Result<&mut Request, LedgerError> {
        id.checked_sub(1)
            .and_then(|index| self.requests.get_mut(index as usize))
            .ok_or(LedgerError::UnknownRequest(id))
    }
}

impl Default for NullLido {
    fn default() -> Self {
        Self::new()
    }
}

fn credit_shares(book: &mut HashMap<Address, SharesValue>, holder: &Address, amount: SharesValue) {
    let balance = book.entry(holder.clone()).or_default();
    *balance = SharesValue::new(balance.raw() + amount.raw());
}

fn debit_shares(book: &mut HashMap<Address, SharesValue>, holder: &Address, amount: SharesValue) {
    let balance = book.entry(holder.clone()).or_default();
    *balance = SharesValue::new(balance.raw().saturating_sub(amount.raw()));
}

fn check_available(holder: &Address, needed: u128, available: u128) -> Result<(), LedgerError> {
    if available < needed {
        return Err(LedgerError::InsufficientBalance {
            holder: holder.clone(),
            needed,
            available,
        });
    }
    Ok(())
}

impl StEthToken for NullLido {
    fn total_pooled_ether(&self) -> ETHValue {
        self.total_pooled_ether
    }

    fn total_shares(&self) -> SharesValue {
        self.total_shares
    }

    fn shares_of(&self, holder: &Address) -> SharesValue {
        self.shares.get(holder).copied().unwrap_or_default()
    }

    fn transfer_shares(
        &mut self,
        from: &Address,
        to: &Address,
        shares: SharesValue,
    ) -> Result<(), LedgerError> {
        check_available(from, shares.raw(), self.shares_of(from).raw())?;
        debit_shares(&mut self.shares, from, shares);
        credit_shares(&mut self.shares, to, shares);
        Ok(())
    }
}

impl WstEthToken for NullLido {
    fn wsteth_balance_of(&self, holder: &Address) -> SharesValue {
        self.wsteth.get(holder).copied().unwrap_or_default()
    }

    fn transfer_wsteth(
        &mut self,
        from: &Address,
        to: &Address,
        amount: SharesValue,
    ) -> Result<(), LedgerError> {
        check_available(from, amount.raw(), self.wsteth_balance_of(from).raw())?;
        debit_shares(&mut self.wsteth, from, amount);
        credit_shares(&mut self.wsteth, to, amount);
        Ok(())
    }

    fn unwrap_wsteth(&mut self, holder: &Address, amount: SharesValue) -> Result<(), LedgerError> {
        check_available(holder, amount.raw(), self.wsteth_balance_of(holder).raw())?;
        debit_shares(&mut self.wsteth, holder, amount);
        credit_shares(&mut self.shares, holder, amount);
        Ok(())
    }

    fn wrap_steth_shares(
        &mut self,
        holder: &Address,
        shares: SharesValue,
    ) -> Result<(), LedgerError> {
        check_available(holder, shares.raw(), self.shares_of(holder).raw())?;
        debit_shares(&mut self.shares, holder, shares);
        credit_shares(&mut self.wsteth, holder, shares);
        Ok(())
    }
}

impl WithdrawalQueue for NullLido {
    fn min_steth_withdrawal_amount(&self) -> ETHValue {
        self.min_withdrawal
    }

    fn max_steth_withdrawal_amount(&self) -> ETHValue {
        self.max_withdrawal
    }

    fn request_withdrawals(
        &mut self,
        owner: &Address,
        amounts: &[ETHValue],
    ) -> Result<Vec<UnstEthId>, LedgerError> {
        let mut shares = Vec::with_capacity(amounts.len());
        let mut total = 0u128;
        for amount in amounts {
            if *amount < self.min_withdrawal || *amount > self.max_withdrawal {
                return Err(LedgerError::RequestAmountOutOfRange {
                    amount: amount.raw(),
                    min: self.min_withdrawal.raw(),
                    max: self.max_withdrawal.raw(),
                });
            }
            let amount_shares = self.shares_by_pooled_eth(*amount)?;
            total += amount_shares.raw();
            shares.push(amount_shares);
        }
        check_available(owner, total, self.shares_of(owner).raw())?;

        let queue = self.queue.clone();
        let mut ids = Vec::with_capacity(amounts.len());
        for (amount, amount_shares) in amounts.iter().zip(shares) {
            self.transfer_shares(owner, &queue, amount_shares)?;
            self.requests.push(Request {
                amount_of_steth: *amount,
                amount_of_shares: amount_shares,
                owner: owner.clone(),
                timestamp: self.now,
                claimable: ETHValue::ZERO,
                is_finalized: false,
                is_claimed: false,
            });
            ids.push(self.requests.len() as UnstEthId);
        }
        Ok(ids)
    }

    fn withdrawal_status(&self, id: UnstEthId) -> Result<WithdrawalRequestStatus, LedgerError> {
        let request = self.request(id)?;
        Ok(WithdrawalRequestStatus {
            amount_of_steth: request.amount_of_steth,
            amount_of_shares: request.amount_of_shares,
            owner: request.owner.clone(),
            timestamp: request.timestamp,
            is_finalized: request.is_finalized,
            is_claimed: request.is_claimed,
        })
    }

    fn claimable_ether(&self, id: UnstEthId) -> Result<ETHValue, LedgerError> {
        let request = self.request(id)?;
        if request.is_finalized && !request.is_claimed {
            Ok(request.claimable)
        } else {
            Ok(ETHValue::ZERO)
        }
    }

    fn last_request_id(&self) -> UnstEthId {
        self.requests.len() as UnstEthId
    }

    fn last_finalized_request_id(&self) -> UnstEthId {
        self.last_finalized
    }

    fn transfer_request(
        &mut self,
        from: &Address,
        to: &Address,
        id: UnstEthId,
    ) -> Result<(), LedgerError> {
        let request = self.request_mut(id)?;
        if request.owner != *from {
            return Err(LedgerError::NotRequestOwner {
                id,
                caller: from.clone(),
            });
        }
        if request.is_claimed {
            return Err(LedgerError::RequestAlreadyClaimed(id));
        }
        request.owner = to.clone();
        Ok(())
    }

    fn claim_withdrawal(
        &mut self,
        owner: &Address,
        id: UnstEthId,
    ) -> Result<ETHValue, LedgerError> {
        let request = self.request_mut(id)?;
        if request.owner != *owner {
            return Err(LedgerError::NotRequestOwner {
                id,
                caller: owner.clone(),
            });
        }
        if request.is_claimed {
            return Err(LedgerError::RequestAlreadyClaimed(id));
        }
        if !request.is_finalized {
            return Err(LedgerError::RequestNotFinalized(id));
        }
        request.is_claimed = true;
        let amount = request.claimable;
        let queue = self.queue.clone();
        self.transfer_eth(&queue, owner, amount)?;
        Ok(amount)
    }
}

impl EtherLedger for NullLido {
    fn eth_balance(&self, holder: &Address) -> ETHValue {
        self.eth.get(holder).copied().unwrap_or_default()
    }

    fn transfer_eth(
        &mut self,
        from: &Address,
        to: &Address,
        amount: ETHValue,
    ) -> Result<(), LedgerError> {
        let available = self.eth_balance(from);
        check_available(from, amount.raw(), available.raw())?;
        self.eth
            .insert(from.clone(), ETHValue::new(available.raw() - amount.raw()));
        self.credit_eth(to, amount);
        Ok(())
    }
}
