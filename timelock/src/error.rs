use dualgov_types::{Address, Duration, ErrorKind, Timestamp, ValueError};
use thiserror::Error;

use crate::proposals::ProposalStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelockError {
    #[error("proposal must contain at least one call")]
    EmptyCalls,

    #[error("proposal {0} does not exist")]
    ProposalNotFound(u64),

    #[error("proposal {id} is {actual:?}, expected {expected:?}")]
    UnexpectedProposalStatus {
        id: u64,
        expected: ProposalStatus,
        actual: ProposalStatus,
    },

    #[error("proposal {id} cannot be scheduled before {ready_at}")]
    AfterSubmitDelayNotPassed { id: u64, ready_at: Timestamp },

    #[error("proposal {id} cannot be executed before {ready_at}")]
    AfterScheduleDelayNotPassed { id: u64, ready_at: Timestamp },

    #[error("{caller} is not the {role}")]
    Unauthorized { caller: Address, role: &'static str },

    #[error("emergency mode is active")]
    EmergencyModeActive,

    #[error("emergency mode is not active")]
    EmergencyModeNotActive,

    #[error("emergency protection expired at {protected_till}")]
    EmergencyProtectionExpired { protected_till: Timestamp },

    #[error("emergency mode lasts until {ends_after}")]
    EmergencyModeNotPassed { ends_after: Timestamp },

    #[error("{name} of {value} exceeds the maximum of {max}")]
    DurationTooLong {
        name: &'static str,
        value: Duration,
        max: Duration,
    },

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl TimelockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AfterSubmitDelayNotPassed { .. }
            | Self::AfterScheduleDelayNotPassed { .. }
            | Self::EmergencyModeNotPassed { .. } => ErrorKind::Timing,
            Self::Value(e) => e.kind(),
            _ => ErrorKind::Precondition,
        }
    }
}
