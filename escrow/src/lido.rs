//! Interfaces of the external token ledgers the escrow drives.
//!
//! The escrow never owns balances itself: it moves stETH shares, wstETH and
//! withdrawal-request NFTs between holders and its own address through these
//! traits, and receives ether when withdrawal requests are claimed. The
//! harness supplies the implementation.

use dualgov_types::{mul_div, Address, ETHValue, ErrorKind, SharesValue, Timestamp, ValueError};
use thiserror::Error;

/// Id of a withdrawal request (an unstETH NFT).
pub type UnstEthId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{holder} holds {available} but {needed} is required")]
    InsufficientBalance {
        holder: Address,
        needed: u128,
        available: u128,
    },

    #[error("withdrawal request {0} does not exist")]
    UnknownRequest(UnstEthId),

    #[error("withdrawal request {id} is not owned by {caller}")]
    NotRequestOwner { id: UnstEthId, caller: Address },

    #[error("withdrawal request {0} is not finalized")]
    RequestNotFinalized(UnstEthId),

    #[error("withdrawal request {0} was already claimed")]
    RequestAlreadyClaimed(UnstEthId),

    #[error("withdrawal amount {amount} is outside [{min}, {max}]")]
    RequestAmountOutOfRange { amount: u128, min: u128, max: u128 },

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestAlreadyClaimed(_) => ErrorKind::Replay,
            Self::RequestNotFinalized(_) => ErrorKind::Timing,
            Self::Value(e) => e.kind(),
            _ => ErrorKind::Precondition,
        }
    }
}

/// Snapshot of one withdrawal request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalRequestStatus {
    pub amount_of_steth: ETHValue,
    pub amount_of_shares: SharesValue,
    pub owner: Address,
    pub timestamp: Timestamp,
    pub is_finalized: bool,
    pub is_claimed: bool,
}

/// The rebasing stETH token, accounted in shares.
pub trait StEthToken {
    /// Total ether backing all shares; equals the stETH total supply.
    fn total_pooled_ether(&self) -> ETHValue;

    fn total_shares(&self) -> SharesValue;

    fn shares_of(&self, holder: &Address) -> SharesValue;

    fn transfer_shares(
        &mut self,
        from: &Address,
        to: &Address,
        shares: SharesValue,
    ) -> Result<(), LedgerError>;

    fn pooled_eth_by_shares(&self, shares: SharesValue) -> Result<ETHValue, LedgerError> {
        let eth = mul_div(
            shares.raw(),
            self.total_pooled_ether().raw(),
            self.total_shares().raw(),
        )?;
        Ok(ETHValue::new(eth))
    }

    fn shares_by_pooled_eth(&self, eth: ETHValue) -> Result<SharesValue, LedgerError> {
        let shares = mul_div(
            eth.raw(),
            self.total_shares().raw(),
            self.total_pooled_ether().raw(),
        )?;
        Ok(SharesValue::new(shares))
    }

    /// stETH balance of `holder`, in ether.
    fn balance_of(&self, holder: &Address) -> Result<ETHValue, LedgerError> {
        self.pooled_eth_by_shares(self.shares_of(holder))
    }
}

/// The non-rebasing wstETH wrapper. One wstETH unit is one stETH share.
pub trait WstEthToken {
    fn wsteth_balance_of(&self, holder: &Address) -> SharesValue;

    fn transfer_wsteth(
        &mut self,
        from: &Address,
        to: &Address,
        amount: SharesValue,
    ) -> Result<(), LedgerError>;

    /// Burn `amount` wstETH of `holder` and credit the same number of stETH
    /// shares to them.
    fn unwrap_wsteth(&mut self, holder: &Address, amount: SharesValue) -> Result<(), LedgerError>;

    /// Burn `shares` stETH shares of `holder` and mint the same number of
    /// wstETH to them.
    fn wrap_steth_shares(&mut self, holder: &Address, shares: SharesValue)
        -> Result<(), LedgerError>;
}

/// The withdrawal queue issuing unstETH NFTs.
pub trait WithdrawalQueue {
    fn min_steth_withdrawal_amount(&self) -> ETHValue;

    fn max_steth_withdrawal_amount(&self) -> ETHValue;

    /// Lock `amounts` of the owner's stETH into new withdrawal requests.
    /// Returned ids are sequential.
    fn request_withdrawals(
        &mut self,
        owner: &Address,
        amounts: &[ETHValue],
    ) -> Result<Vec<UnstEthId>, LedgerError>;

    fn withdrawal_status(&self, id: UnstEthId) -> Result<WithdrawalRequestStatus, LedgerError>;

    /// Ether claimable for `id`; zero while unfinalized or once claimed.
    fn claimable_ether(&self, id: UnstEthId) -> Result<ETHValue, LedgerError>;

    fn last_request_id(&self) -> UnstEthId;

    fn last_finalized_request_id(&self) -> UnstEthId;

    fn transfer_request(
        &mut self,
        from: &Address,
        to: &Address,
        id: UnstEthId,
    ) -> Result<(), LedgerError>;

    /// Claim a finalized request, crediting its ether to `owner`.
    fn claim_withdrawal(&mut self, owner: &Address, id: UnstEthId) -> Result<ETHValue, LedgerError>;
}

/// Plain ether balances.
pub trait EtherLedger {
    fn eth_balance(&self, holder: &Address) -> ETHValue;

    fn transfer_eth(
        &mut self,
        from: &Address,
        to: &Address,
        amount: ETHValue,
    ) -> Result<(), LedgerError>;
}

/// Everything the escrow needs from the outside world.
pub trait Lido: StEthToken + WstEthToken + WithdrawalQueue + EtherLedger {}

impl<T: StEthToken + WstEthToken + WithdrawalQueue + EtherLedger + ?Sized> Lido for T {}
