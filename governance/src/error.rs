use crate::state::GovernanceState;
use dualgov_escrow::EscrowError;
use dualgov_timelock::TimelockError;
use dualgov_types::{Address, ErrorKind, ValueError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    #[error("proposal creation is suspended in {0:?}")]
    ProposalsCreationSuspended(GovernanceState),

    #[error("proposal {id} cannot be adopted in {state:?}")]
    ProposalsAdoptionSuspended { id: u64, state: GovernanceState },

    #[error("{caller} is not the {role}")]
    Unauthorized {
        caller: Address,
        role: &'static str,
    },

    #[error("{0} is not a registered proposer")]
    UnknownProposer(Address),

    #[error("{0} is already a registered proposer")]
    ProposerAlreadyRegistered(Address),

    #[error("the admin executor must keep at least one proposer")]
    LastAdminProposer,

    #[error("tiebreak is not active")]
    TiebreakNotActive,

    #[error("resealing is not allowed in {0:?}")]
    ResealNotAllowed(GovernanceState),

    #[error("sealable {0} is not registered")]
    UnknownSealable(Address),

    #[error("sealable {0} is already registered")]
    SealableAlreadyRegistered(Address),

    #[error("sealable {0} is not paused")]
    SealableNotPaused(Address),

    #[error("sealable {0} is already paused indefinitely")]
    SealablePausedIndefinitely(Address),

    #[error("escrow {0} does not exist")]
    UnknownEscrow(usize),

    #[error("escrow {0} is still the signalling escrow")]
    EscrowNotRetired(usize),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Timelock(#[from] TimelockError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timelock(e) => e.kind(),
            Self::Escrow(e) => e.kind(),
            Self::Value(e) => e.kind(),
            _ => ErrorKind::Precondition,
        }
    }
}
