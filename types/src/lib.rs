//! Fundamental value types for the Dual Governance engine.
//!
//! Every other crate in the workspace builds on these: bounded timestamps and
//! durations, share and ether amounts with checked arithmetic, fixed-point
//! percentages, one-based indices, packed id batches, action hashes and
//! participant addresses. None of them wraps silently on overflow.

pub mod address;
pub mod amount;
pub mod batch;
pub mod error;
pub mod hash;
pub mod index;
pub mod percent;
pub mod time;

pub use address::Address;
pub use amount::{mul_div, ETHValue, SharesValue};
pub use batch::{SequentialBatch, MAX_BATCH_SIZE};
pub use error::{ErrorKind, ValueError};
pub use hash::ActionHash;
pub use index::IndexOneBased;
pub use percent::{PercentD16, HUNDRED_PERCENT_D16};
pub use time::{Duration, TimeSource, Timestamp};
