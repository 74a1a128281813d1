//! Veto escrows of the dual governance.
//!
//! An [`Escrow`] holds the stETH, wstETH and withdrawal NFTs that stakers
//! lock to signal opposition, reports the resulting rage-quit support, and
//! once promoted to a rage-quit escrow turns its holdings into ether through
//! the withdrawal queue. All ledgers are reached through the [`Lido`] trait
//! family so the escrow itself holds only bookkeeping.

pub mod accounting;
pub mod batches_queue;
pub mod error;
pub mod escrow;
pub mod lido;

pub use accounting::{
    AssetsAccounting, HolderAssets, LockedAssetsTotals, UnstEthRecord, UnstEthRecordStatus,
};
pub use batches_queue::{QueueState, WithdrawalsBatchesQueue};
pub use error::EscrowError;
pub use escrow::{Escrow, EscrowParams, EscrowState, VetoerState};
pub use lido::{
    EtherLedger, LedgerError, Lido, StEthToken, UnstEthId, WithdrawalQueue,
    WithdrawalRequestStatus, WstEthToken,
};
