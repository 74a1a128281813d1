//! Committees of the dual governance.
//!
//! Every committee is a [`HashConsensus`]: members approve the content hash
//! of an action, and once a quorum has held for the committee's timelock the
//! action can be executed exactly once. The specialized committees encode
//! their parameters into [`CommitteeAction`]s and, on execution, call into
//! the timelock or the [`dualgov_governance::DualGovernance`] facade under
//! their own address.

pub mod action;
pub mod committee;
pub mod emergency;
pub mod error;
pub mod hash_consensus;
pub mod proposals_list;
pub mod reseal;
pub mod tiebreaker;

pub use action::CommitteeAction;
pub use committee::{Committee, ProposedAction};
pub use emergency::{EmergencyActivationCommittee, EmergencyExecutionCommittee};
pub use error::CommitteeError;
pub use hash_consensus::{HashConsensus, HashStatus};
pub use proposals_list::ProposalsList;
pub use reseal::ResealCommittee;
pub use tiebreaker::{TiebreakerCoreCommittee, TiebreakerSubCommittee};
