use crate::accounting::UnstEthRecordStatus;
use crate::batches_queue::QueueState;
use crate::escrow::EscrowState;
use crate::lido::{LedgerError, UnstEthId};
use dualgov_types::{Address, ErrorKind, Timestamp, ValueError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    #[error("escrow {escrow} is in state {actual:?}, expected {expected:?}")]
    UnexpectedEscrowState {
        escrow: Address,
        expected: EscrowState,
        actual: EscrowState,
    },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("{holder} has no locked stETH shares")]
    NoLockedShares { holder: Address },

    #[error("assets of {holder} stay locked until {unlock_available_at}")]
    MinAssetsLockDurationNotPassed {
        holder: Address,
        unlock_available_at: Timestamp,
    },

    #[error("list of unstETH ids is empty")]
    EmptyUnstEthIds,

    #[error("unstETH {0} listed more than once")]
    DuplicateUnstEthId(UnstEthId),

    #[error("unstETH {0} is already finalized")]
    UnstEthAlreadyFinalized(UnstEthId),

    #[error("unstETH {0} is already locked")]
    UnstEthAlreadyLocked(UnstEthId),

    #[error("unstETH {0} is not locked in this escrow")]
    UnstEthNotLocked(UnstEthId),

    #[error("unstETH {id} was not locked by {holder}")]
    UnstEthLockedByOther { id: UnstEthId, holder: Address },

    #[error("unstETH {id} has status {status:?}")]
    InvalidUnstEthStatus {
        id: UnstEthId,
        status: UnstEthRecordStatus,
    },

    #[error("unstETH {id} was already processed ({status:?})")]
    UnstEthAlreadyProcessed {
        id: UnstEthId,
        status: UnstEthRecordStatus,
    },

    #[error("unstETH {id} claimed {actual} but {expected} was finalized")]
    ClaimedAmountMismatch {
        id: UnstEthId,
        expected: u128,
        actual: u128,
    },

    #[error("withdrawal request {0} is not claimable yet")]
    WithdrawalNotClaimable(UnstEthId),

    #[error("batch size {size} is below the minimum of {min}")]
    BatchSizeTooSmall { size: usize, min: usize },

    #[error("withdrawals batches queue is {actual:?}, expected {expected}")]
    UnexpectedQueueState {
        expected: &'static str,
        actual: QueueState,
    },

    #[error("unstETH ids are not sequential: {previous} followed by {next}")]
    NonSequentialIds { previous: UnstEthId, next: UnstEthId },

    #[error("unstETH {next} does not follow the last queued id {last}")]
    IdsNotIncreasing { last: UnstEthId, next: UnstEthId },

    #[error("{remaining} withdrawal requests are still unclaimed")]
    UnclaimedBatches { remaining: u64 },

    #[error("requests up to {boundary} are not finalized (last finalized {last_finalized})")]
    UnstEthNotFinalized {
        boundary: UnstEthId,
        last_finalized: UnstEthId,
    },

    #[error("rage quit extension delay already started")]
    ExtensionDelayAlreadyStarted,

    #[error("rage quit withdrawals are locked (available after {available_after:?})")]
    WithdrawalsTimelockNotPassed { available_after: Option<Timestamp> },

    #[error("{holder} has nothing to withdraw")]
    NothingToWithdraw { holder: Address },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MinAssetsLockDurationNotPassed { .. }
            | Self::WithdrawalNotClaimable(_)
            | Self::UnstEthNotFinalized { .. }
            | Self::WithdrawalsTimelockNotPassed { .. } => ErrorKind::Timing,
            Self::UnstEthAlreadyProcessed { .. } => ErrorKind::Replay,
            Self::Ledger(e) => e.kind(),
            Self::Value(e) => e.kind(),
            _ => ErrorKind::Precondition,
        }
    }
}
