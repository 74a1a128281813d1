use dualgov_governance::GovernanceError;
use dualgov_timelock::TimelockError;
use dualgov_types::{ActionHash, Address, ErrorKind, Timestamp, ValueError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitteeError {
    #[error("{caller} is not the {role}")]
    Unauthorized {
        caller: Address,
        role: &'static str,
    },

    #[error("{0} is not a committee member")]
    NotMember(Address),

    #[error("{0} is already a committee member")]
    AlreadyMember(Address),

    #[error("quorum {quorum} is outside 1..={members}")]
    InvalidQuorum { quorum: usize, members: usize },

    #[error("action {0} was already executed")]
    HashAlreadyUsed(ActionHash),

    #[error("action {hash} has {support} of {quorum} required approvals")]
    QuorumNotReached {
        hash: ActionHash,
        support: usize,
        quorum: usize,
    },

    #[error("action {hash} cannot be executed before {available_at}")]
    TimelockNotPassed {
        hash: ActionHash,
        available_at: Timestamp,
    },

    #[error("proposal {0} does not exist")]
    UnknownProposal(u64),

    #[error("sealable {0} is not registered")]
    UnknownSealable(Address),

    #[error("no sealables given")]
    EmptySealables,

    #[error(transparent)]
    Governance(#[from] GovernanceError),

    #[error(transparent)]
    Timelock(#[from] TimelockError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl CommitteeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HashAlreadyUsed(_) => ErrorKind::Replay,
            Self::TimelockNotPassed { .. } => ErrorKind::Timing,
            Self::Governance(e) => e.kind(),
            Self::Timelock(e) => e.kind(),
            Self::Value(e) => e.kind(),
            _ => ErrorKind::Precondition,
        }
    }
}
