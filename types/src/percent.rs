//! Fixed-point percentages with 16 decimals after the percent sign.

use crate::amount::mul_div;
use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `10^18` raw units equal 100%.
pub const HUNDRED_PERCENT_D16: u64 = 1_000_000_000_000_000_000;

const ONE_PERCENT_D16: u64 = HUNDRED_PERCENT_D16 / 100;
const BASIS_POINT_D16: u64 = HUNDRED_PERCENT_D16 / 10_000;

/// A percentage scaled so that `HUNDRED_PERCENT` is `10^18`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PercentD16(u64);

impl PercentD16 {
    pub const ZERO: Self = Self(0);
    pub const HUNDRED_PERCENT: Self = Self(HUNDRED_PERCENT_D16);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn from_percent(percent: u64) -> Self {
        Self(percent * ONE_PERCENT_D16)
    }

    pub const fn from_basis_points(bp: u64) -> Self {
        Self(bp * BASIS_POINT_D16)
    }

    /// `numerator / denominator` as a percentage, rounded down.
    pub fn from_fraction(numerator: u128, denominator: u128) -> Result<Self, ValueError> {
        let raw = mul_div(numerator, HUNDRED_PERCENT_D16 as u128, denominator)?;
        u64::try_from(raw)
            .map(Self)
            .map_err(|_| ValueError::OutOfBounds {
                value: raw,
                bits: u64::BITS,
            })
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ValueError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(ValueError::Underflow)
    }
}

impl fmt::Display for PercentD16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ONE_PERCENT_D16;
        let fraction = (self.0 % ONE_PERCENT_D16) / (ONE_PERCENT_D16 / 10_000);
        write!(f, "{whole}.{fraction:04}%")
    }
}
