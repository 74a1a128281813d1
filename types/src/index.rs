//! One-based index, where zero is reserved for "not present".

use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexOneBased(u32);

impl IndexOneBased {
    pub fn from_one_based(value: u32) -> Result<Self, ValueError> {
        if value == 0 {
            return Err(ValueError::ZeroIndex);
        }
        Ok(Self(value))
    }

    /// Convert a position in a `Vec` into a one-based index.
    pub fn from_zero_based(position: usize) -> Result<Self, ValueError> {
        let value = u32::try_from(position)
            .ok()
            .and_then(|p| p.checked_add(1))
            .ok_or(ValueError::OutOfBounds {
                value: position as u128,
                bits: u32::BITS,
            })?;
        Ok(Self(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn to_zero_based(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for IndexOneBased {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
