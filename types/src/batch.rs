//! Packed run of consecutive withdrawal-request ids.
//!
//! A batch stores its first id in the upper bits and its size in the lower
//! 16 bits of a single `u128`, so a queue of batches stays compact even when
//! a rage quit produces thousands of requests.

use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

const BATCH_SIZE_BITS: u32 = 16;
const BATCH_SIZE_MASK: u128 = (1 << BATCH_SIZE_BITS) - 1;

/// Largest number of ids a single batch can hold.
pub const MAX_BATCH_SIZE: u16 = u16::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequentialBatch(u128);

impl SequentialBatch {
    /// Create a batch covering `first..first + size`.
    pub fn new(first: u64, size: u16) -> Result<Self, ValueError> {
        if size == 0 {
            return Err(ValueError::EmptyBatch);
        }
        first
            .checked_add(size as u64 - 1)
            .ok_or(ValueError::Overflow)?;
        Ok(Self(((first as u128) << BATCH_SIZE_BITS) | size as u128))
    }

    pub fn first(&self) -> u64 {
        (self.0 >> BATCH_SIZE_BITS) as u64
    }

    pub fn size(&self) -> u16 {
        (self.0 & BATCH_SIZE_MASK) as u16
    }

    pub fn last(&self) -> u64 {
        self.first() + self.size() as u64 - 1
    }

    /// How many more ids the batch can absorb.
    pub fn capacity(&self) -> u16 {
        MAX_BATCH_SIZE - self.size()
    }

    /// Id at `offset` within the batch, if the offset is in range.
    pub fn id_at(&self, offset: u16) -> Option<u64> {
        (offset < self.size()).then(|| self.first() + offset as u64)
    }

    pub fn can_merge(&self, next: &SequentialBatch) -> bool {
        self.last().checked_add(1) == Some(next.first()) && self.capacity() >= next.size()
    }

    pub fn merge(&self, next: &SequentialBatch) -> Result<Self, ValueError> {
        if !self.can_merge(next) {
            return Err(ValueError::Overflow);
        }
        Self::new(self.first(), self.size() + next.size())
    }
}

impl fmt::Debug for SequentialBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequentialBatch({}..={})", self.first(), self.last())
    }
}
