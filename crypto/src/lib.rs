//! Hashing primitives for the Dual Governance engine.
//!
//! Committees vote on content-addressed actions: every action's parameters
//! are encoded and hashed with Blake2b-256 so identical parameters collapse
//! onto one vote tally.

pub mod hash;

pub use hash::hash_action;
