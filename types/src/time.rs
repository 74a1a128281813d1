//! Timestamp and duration types plus the simulated time source.
//!
//! Timestamps are bounded to 40 bits and durations to 32 bits, mirroring the
//! widths the protocol stores them in. Neither wraps: every arithmetic
//! operation is checked.

use crate::error::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

const TIMESTAMP_BITS: u32 = 40;
const MAX_TIMESTAMP_SECS: u64 = (1 << TIMESTAMP_BITS) - 1;

const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR: u32 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u32 = 24 * SECONDS_PER_HOUR;

/// A point in simulated time, in seconds. Zero means "unset".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u64", into = "u64")]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(MAX_TIMESTAMP_SECS);

    /// Create a timestamp from whole seconds, for constants and fixtures.
    ///
    /// Engine code derives timestamps through [`Timestamp::try_new`] and
    /// [`Timestamp::checked_add`]; deserialization goes through `try_new`.
    ///
    /// # Panics
    /// Panics if `secs` does not fit into 40 bits. In a `const` item this is
    /// a compile error.
    pub const fn new(secs: u64) -> Self {
        assert!(secs <= MAX_TIMESTAMP_SECS, "timestamp exceeds 40 bits");
        Self(secs)
    }

    pub fn try_new(secs: u64) -> Result<Self, ValueError> {
        if secs > MAX_TIMESTAMP_SECS {
            return Err(ValueError::OutOfBounds {
                value: secs as u128,
                bits: TIMESTAMP_BITS,
            });
        }
        Ok(Self(secs))
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, duration: Duration) -> Result<Self, ValueError> {
        Self::try_new(self.0 + duration.as_secs() as u64)
    }

    /// Time elapsed from `self` until `now`, or zero if `now` precedes `self`.
    pub fn elapsed_since(&self, now: Timestamp) -> Duration {
        let secs = now.0.saturating_sub(self.0);
        Duration(secs.min(u32::MAX as u64) as u32)
    }

    /// Whether `now >= self + duration`.
    pub fn has_expired(&self, duration: Duration, now: Timestamp) -> bool {
        now.0 >= self.0 + duration.as_secs() as u64
    }

    /// Whether `now > self + duration`, i.e. the duration has fully passed
    /// and at least one more second went by.
    pub fn has_passed(&self, duration: Duration, now: Timestamp) -> bool {
        now.0 > self.0 + duration.as_secs() as u64
    }
}

impl TryFrom<u64> for Timestamp {
    type Error = ValueError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::try_new(secs)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// A span of simulated time, in seconds.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Duration(u32);

impl Duration {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u32::MAX);

    pub const fn new(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes * SECONDS_PER_MINUTE)
    }

    pub const fn from_hours(hours: u32) -> Self {
        Self(hours * SECONDS_PER_HOUR)
    }

    pub const fn from_days(days: u32) -> Self {
        Self(days * SECONDS_PER_DAY)
    }

    pub fn try_from_secs(secs: u128) -> Result<Self, ValueError> {
        u32::try_from(secs)
            .map(Self)
            .map_err(|_| ValueError::OutOfBounds {
                value: secs,
                bits: u32::BITS,
            })
    }

    pub fn as_secs(&self) -> u32 {
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

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// The single "current time" cursor of one simulation run.
///
/// Owned by the driver; engine components never read it directly but
/// receive `now` on every call.
#[derive(Clone, Debug)]
pub struct TimeSource {
    current: Timestamp,
}

impl TimeSource {
    pub fn new(start: Timestamp) -> Self {
        Self { current: start }
    }

    pub fn now(&self) -> Timestamp {
        self.current
    }

    /// Move time forward by `duration` and return the new current time.
    pub fn shift(&mut self, duration: Duration) -> Result<Timestamp, ValueError> {
        self.current = self.current.checked_add(duration)?;
        Ok(self.current)
    }

    /// Jump to an absolute timestamp, which must not be in the past.
    pub fn advance_to(&mut self, target: Timestamp) -> Result<(), ValueError> {
        if target < self.current {
            return Err(ValueError::TimeMovedBackwards {
                now: self.current.as_secs(),
                requested: target.as_secs(),
            });
        }
        self.current = target;
        Ok(())
    }
}

impl Default for TimeSource {
    fn default() -> Self {
        Self::new(Timestamp::ZERO)
    }
}
