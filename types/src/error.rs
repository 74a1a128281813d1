//! Value-level errors and the error taxonomy shared across crates.

use std::fmt;
use thiserror::Error;

/// Coarse classification every engine error maps onto.
///
/// Callers use it to decide whether to retry later (`Timing`), treat the
/// failure as a modelled outcome (`Precondition`, `Replay`), or abort the
/// run (`Arithmetic`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong status, wrong caller, insufficient locked amount.
    Precondition,
    /// A delay or timelock has not elapsed yet; retry once time advances.
    Timing,
    /// Overflow, underflow or division by zero in a bounded value type.
    Arithmetic,
    /// Re-use of a consumed action hash or an already claimed position.
    Replay,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Precondition => "precondition",
            Self::Timing => "timing",
            Self::Arithmetic => "arithmetic",
            Self::Replay => "replay",
        };
        f.write_str(name)
    }
}

/// Errors raised by the bounded value types.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("value {value} does not fit into {bits} bits")]
    OutOfBounds { value: u128, bits: u32 },

    #[error("one-based index must be non-zero")]
    ZeroIndex,

    #[error("sequential batch must contain at least one id")]
    EmptyBatch,

    #[error("time cannot move backwards: now {now}, requested {requested}")]
    TimeMovedBackwards { now: u64, requested: u64 },

    #[error("action hash must be 64 hex characters")]
    InvalidHash,
}

impl ValueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TimeMovedBackwards { .. } | Self::InvalidHash => ErrorKind::Precondition,
            _ => ErrorKind::Arithmetic,
        }
    }
}
