//! Proposal lifecycle and the emergency-protected timelock.
//!
//! Proposals are submitted and scheduled by the governance address only,
//! executed by anyone once their delays passed, and can be cancelled one by
//! one or all at once. Emergency protection lets two committees freeze
//! regular execution and, if needed, hand control to an emergency
//! governance.

pub mod config;
pub mod emergency;
pub mod error;
pub mod proposals;
pub mod timelock;

pub use config::TimelockConfig;
pub use emergency::EmergencyProtection;
pub use error::TimelockError;
pub use proposals::{ExecutorCall, Proposal, ProposalStatus, Proposals};
pub use timelock::{EmergencyProtectedTimelock, EmergencyProtectionSetup};
