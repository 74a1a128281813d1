//! Share and ether amounts.
//!
//! Both are non-negative `u128` values with checked arithmetic. There is no
//! direct conversion between them: shares become ether only through the
//! stETH pooled-ether/shares rate.

use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A number of stETH shares.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SharesValue(u128);

impl SharesValue {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Result<Self, ValueError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ValueError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ValueError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(ValueError::Underflow)
    }
}

impl fmt::Display for SharesValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} shares", self.0)
    }
}

/// An amount of ether, in wei.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ETHValue(u128);

impl ETHValue {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Result<Self, ValueError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ValueError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ValueError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(ValueError::Underflow)
    }
}

impl fmt::Display for ETHValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

/// Compute `a * b / denominator`, rounding down, with a 256-bit intermediate
/// product so large balances never overflow mid-computation.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, ValueError> {
    if denominator == 0 {
        return Err(ValueError::DivisionByZero);
    }
    let (hi, lo) = full_mul(a, b);
    if hi == 0 {
        return Ok(lo / denominator);
    }
    // The quotient fits into 128 bits only when the high half is below the divisor.
    if hi >= denominator {
        return Err(ValueError::Overflow);
    }

    let mut remainder = hi;
    let mut quotient: u128 = 0;
    for bit in (0..128).rev() {
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || remainder >= denominator {
            remainder = remainder.wrapping_sub(denominator);
            quotient |= 1;
        }
    }
    Ok(quotient)
}

/// Full 128x128 -> 256-bit multiplication, returned as (high, low).
fn full_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}
