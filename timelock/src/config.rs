//! Timelock delays and their upper bounds.

use crate::error::TimelockError;
use dualgov_types::Duration;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockConfig {
    /// Minimum time between submission and scheduling.
    #[serde(default = "default_after_submit_delay")]
    pub after_submit_delay: Duration,

    /// Minimum time between scheduling and execution.
    #[serde(default = "default_after_schedule_delay")]
    pub after_schedule_delay: Duration,

    #[serde(default = "default_max_delay")]
    pub max_after_submit_delay: Duration,

    #[serde(default = "default_max_delay")]
    pub max_after_schedule_delay: Duration,

    #[serde(default = "default_max_emergency_mode_duration")]
    pub max_emergency_mode_duration: Duration,

    #[serde(default = "default_max_emergency_protection_duration")]
    pub max_emergency_protection_duration: Duration,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_after_submit_delay() -> Duration {
    Duration::from_days(3)
}

fn default_after_schedule_delay() -> Duration {
    Duration::from_days(2)
}

fn default_max_delay() -> Duration {
    Duration::from_days(45)
}

fn default_max_emergency_mode_duration() -> Duration {
    Duration::from_days(365)
}

fn default_max_emergency_protection_duration() -> Duration {
    Duration::from_days(3 * 365)
}

// ── Impl ───────────────────────────────────────────────────────────────

impl TimelockConfig {
    pub fn validate(&self) -> Result<(), TimelockError> {
        check_bound(
            "after_submit_delay",
            self.after_submit_delay,
            self.max_after_submit_delay,
        )?;
        check_bound(
            "after_schedule_delay",
            self.after_schedule_delay,
            self.max_after_schedule_delay,
        )
    }
}

pub(crate) fn check_bound(
    name: &'static str,
    value: Duration,
    max: Duration,
) -> Result<(), TimelockError> {
    if value > max {
        return Err(TimelockError::DurationTooLong { name, value, max });
    }
    Ok(())
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            after_submit_delay: default_after_submit_delay(),
            after_schedule_delay: default_after_schedule_delay(),
            max_after_submit_delay: default_max_delay(),
            max_after_schedule_delay: default_max_delay(),
            max_emergency_mode_duration: default_max_emergency_mode_duration(),
            max_emergency_protection_duration: default_max_emergency_protection_duration(),
        }
    }
}
