//! Nullable infrastructure for deterministic testing.
//!
//! The governance engine only talks to the outside world through the
//! ledger traits of `dualgov-escrow`. This crate provides an in-memory
//! implementation that:
//! - Returns deterministic values
//! - Can be driven programmatically (deposits, rebases, finalization)
//! - Never touches the filesystem or network
//!
//! Usage: pass a [`NullLido`] wherever the engine expects `&mut impl Lido`.

pub mod lido;

pub use lido::{NullLido, DEFAULT_MAX_WITHDRAWAL, DEFAULT_MIN_WITHDRAWAL};
