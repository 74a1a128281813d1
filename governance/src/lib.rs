//! The dual governance of the Lido protocol.
//!
//! Stakers lock assets in a signalling escrow to oppose the DAO. Their
//! rage-quit support drives a five-phase state machine:
//! Normal → VetoSignalling ⇄ Deactivation → VetoCooldown → Normal, with
//! RageQuit entered once support crosses the second seal and the dynamic
//! timelock has run out. While signalling, proposals cannot be adopted;
//! during a rage quit the old escrow exits through the withdrawal queue and
//! a fresh escrow takes its place.

pub mod config;
pub mod dual_governance;
pub mod error;
pub mod proposers;
pub mod sealables;
pub mod state;

pub use config::DualGovernanceConfig;
pub use dual_governance::{DualGovernance, DUAL_GOVERNANCE_ADDRESS};
pub use error::GovernanceError;
pub use proposers::{Proposer, Proposers};
pub use sealables::{Sealables, PAUSE_INFINITELY};
pub use state::{DualGovernanceStateMachine, GovernanceState, MAX_RAGE_QUIT_ROUND};
