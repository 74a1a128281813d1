//! Dual governance parameters.
//!
//! Percentages are raw `PercentD16` integers (10^18 is 100%) and durations
//! are whole seconds, so a TOML file maps one to one onto the protocol's
//! configuration values.

use crate::error::GovernanceError;
use dualgov_timelock::TimelockConfig;
use dualgov_types::{Duration, PercentD16, ValueError, HUNDRED_PERCENT_D16};
use serde::{Deserialize, Serialize};

const COEFFICIENT_SCALE: u128 = HUNDRED_PERCENT_D16 as u128;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualGovernanceConfig {
    /// Support above which signalling starts.
    #[serde(default = "default_first_seal")]
    pub first_seal_rage_quit_support: PercentD16,

    /// Support above which signalling ends in a rage quit.
    #[serde(default = "default_second_seal")]
    pub second_seal_rage_quit_support: PercentD16,

    #[serde(default = "default_min_assets_lock_duration")]
    pub min_assets_lock_duration: Duration,

    /// Dynamic timelock at the first seal.
    #[serde(default = "default_veto_signalling_min_duration")]
    pub veto_signalling_min_duration: Duration,

    /// Dynamic timelock at and above the second seal.
    #[serde(default = "default_veto_signalling_max_duration")]
    pub veto_signalling_max_duration: Duration,

    #[serde(default = "default_veto_signalling_min_active_duration")]
    pub veto_signalling_min_active_duration: Duration,

    #[serde(default = "default_veto_signalling_deactivation_max_duration")]
    pub veto_signalling_deactivation_max_duration: Duration,

    #[serde(default = "default_veto_cooldown_duration")]
    pub veto_cooldown_duration: Duration,

    #[serde(default = "default_rage_quit_extension_period_duration")]
    pub rage_quit_extension_period_duration: Duration,

    #[serde(default = "default_rage_quit_eth_withdrawals_min_timelock")]
    pub rage_quit_eth_withdrawals_min_timelock: Duration,

    /// First rage-quit round the withdrawals timelock starts growing at.
    #[serde(default = "default_growth_start_round")]
    pub rage_quit_eth_withdrawals_timelock_growth_start_round: u8,

    /// Quadratic growth coefficients `[c0, c1, c2]`, scaled by 10^18.
    /// Stored as decimal strings since they may exceed TOML's integer range.
    #[serde(default, with = "coefficients")]
    pub rage_quit_eth_withdrawals_timelock_growth_coeffs: [u128; 3],

    #[serde(default = "default_tiebreaker_activation_timeout")]
    pub tiebreaker_activation_timeout: Duration,

    /// How far past `now` a withdrawal blocker must be paused before the
    /// tiebreak opens during a rage quit.
    #[serde(default)]
    pub sealable_withdrawal_blockers_tolerance: Duration,

    #[serde(default = "default_min_withdrawals_batch_size")]
    pub min_withdrawals_batch_size: usize,

    #[serde(default)]
    pub timelock: TimelockConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_first_seal() -> PercentD16 {
    PercentD16::from_percent(1)
}

fn default_second_seal() -> PercentD16 {
    PercentD16::from_percent(10)
}

fn default_min_assets_lock_duration() -> Duration {
    Duration::from_hours(5)
}

fn default_veto_signalling_min_duration() -> Duration {
    Duration::from_days(3)
}

fn default_veto_signalling_max_duration() -> Duration {
    Duration::from_days(30)
}

fn default_veto_signalling_min_active_duration() -> Duration {
    Duration::from_hours(5)
}

fn default_veto_signalling_deactivation_max_duration() -> Duration {
    Duration::from_days(3)
}

fn default_veto_cooldown_duration() -> Duration {
    Duration::from_days(4)
}

fn default_rage_quit_extension_period_duration() -> Duration {
    Duration::from_days(7)
}

fn default_rage_quit_eth_withdrawals_min_timelock() -> Duration {
    Duration::from_days(60)
}

fn default_growth_start_round() -> u8 {
    2
}

fn default_tiebreaker_activation_timeout() -> Duration {
    Duration::from_days(365)
}

fn default_min_withdrawals_batch_size() -> usize {
    4
}

mod coefficients {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(coeffs: &[u128; 3], s: S) -> Result<S::Ok, S::Error> {
        let strings = coeffs.map(|c| c.to_string());
        serde::Serialize::serialize(&strings, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u128; 3], D::Error> {
        let strings = <[String; 3]>::deserialize(d)?;
        let mut coeffs = [0u128; 3];
        for (slot, raw) in coeffs.iter_mut().zip(strings.iter()) {
            *slot = raw.parse().map_err(D::Error::custom)?;
        }
        Ok(coeffs)
    }
}

// ── Impl ───────────────────────────────────────────────────────────────

impl DualGovernanceConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, GovernanceError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| GovernanceError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string. Missing keys
    /// take their default values.
    pub fn from_toml_str(s: &str) -> Result<Self, GovernanceError> {
        let config: Self = toml::from_str(s).map_err(|e| GovernanceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, GovernanceError> {
        toml::to_string_pretty(self).map_err(|e| GovernanceError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.first_seal_rage_quit_support >= self.second_seal_rage_quit_support {
            return Err(GovernanceError::Config(
                "first seal must be below the second seal".into(),
            ));
        }
        if self.second_seal_rage_quit_support > PercentD16::HUNDRED_PERCENT {
            return Err(GovernanceError::Config(
                "second seal cannot exceed 100%".into(),
            ));
        }
        if self.veto_signalling_min_duration > self.veto_signalling_max_duration {
            return Err(GovernanceError::Config(
                "veto signalling min duration exceeds its max duration".into(),
            ));
        }
        if self.min_assets_lock_duration.is_zero() {
            return Err(GovernanceError::Config(
                "min assets lock duration must be non-zero".into(),
            ));
        }
        if self.min_withdrawals_batch_size == 0 {
            return Err(GovernanceError::Config(
                "min withdrawals batch size must be non-zero".into(),
            ));
        }
        self.timelock.validate()?;
        Ok(())
    }

    /// Time the signalling escrow must hold its support before the phase
    /// may advance. Zero below the first seal, linear between the seals,
    /// saturated at and above the second.
    pub fn dynamic_timelock(&self, support: PercentD16) -> Duration {
        let first = self.first_seal_rage_quit_support;
        let second = self.second_seal_rage_quit_support;
        let min = self.veto_signalling_min_duration;
        let max = self.veto_signalling_max_duration;
        if support < first {
            return Duration::ZERO;
        }
        if support >= second {
            return max;
        }
        let span = max.as_secs().saturating_sub(min.as_secs()) as u128;
        let progress = (support.raw() - first.raw()) as u128;
        let range = (second.raw() - first.raw()) as u128;
        // span * progress stays far below u128::MAX: both factors fit in 64 bits
        Duration::new(min.as_secs() + (span * progress / range) as u32)
    }

    /// ETH withdrawals timelock for an escrow entering rage quit in `round`.
    pub fn rage_quit_withdrawals_timelock(&self, round: u8) -> Result<Duration, ValueError> {
        let min = self.rage_quit_eth_withdrawals_min_timelock;
        if round < self.rage_quit_eth_withdrawals_timelock_growth_start_round {
            return Ok(min);
        }
        let r = round as u128;
        let [c0, c1, c2] = self.rage_quit_eth_withdrawals_timelock_growth_coeffs;
        let growth = c0
            .checked_mul(r * r)
            .and_then(|v| v.checked_add(c1.checked_mul(r)?))
            .and_then(|v| v.checked_add(c2))
            .ok_or(ValueError::Overflow)?
            / COEFFICIENT_SCALE;
        min.checked_add(Duration::try_from_secs(growth)?)
    }
}

impl Default for DualGovernanceConfig {
    fn default() -> Self {
        Self {
            first_seal_rage_quit_support: default_first_seal(),
            second_seal_rage_quit_support: default_second_seal(),
            min_assets_lock_duration: default_min_assets_lock_duration(),
            veto_signalling_min_duration: default_veto_signalling_min_duration(),
            veto_signalling_max_duration: default_veto_signalling_max_duration(),
            veto_signalling_min_active_duration: default_veto_signalling_min_active_duration(),
            veto_signalling_deactivation_max_duration:
                default_veto_signalling_deactivation_max_duration(),
            veto_cooldown_duration: default_veto_cooldown_duration(),
            rage_quit_extension_period_duration: default_rage_quit_extension_period_duration(),
            rage_quit_eth_withdrawals_min_timelock:
                default_rage_quit_eth_withdrawals_min_timelock(),
            rage_quit_eth_withdrawals_timelock_growth_start_round: default_growth_start_round(),
            rage_quit_eth_withdrawals_timelock_growth_coeffs: [0; 3],
            tiebreaker_activation_timeout: default_tiebreaker_activation_timeout(),
            sealable_withdrawal_blockers_tolerance: Duration::ZERO,
            min_withdrawals_batch_size: default_min_withdrawals_batch_size(),
            timelock: TimelockConfig::default(),
        }
    }
}
