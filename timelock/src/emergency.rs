//! Emergency protection state of the timelock.
//!
//! While protection is enabled the activation committee may put the timelock
//! into emergency mode. In emergency mode regular execution is blocked and
//! only the execution committee can execute scheduled proposals or reset
//! governance.

use crate::error::TimelockError;
use dualgov_types::{Address, Duration, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyProtection {
    pub activation_committee: Option<Address>,
    pub execution_committee: Option<Address>,
    pub emergency_governance: Option<Address>,
    /// Last moment emergency mode may still be activated.
    pub protected_till: Timestamp,
    pub emergency_mode_duration: Duration,
    /// Zero while emergency mode is inactive.
    pub emergency_mode_ends_after: Timestamp,
}

impl EmergencyProtection {
    pub fn is_emergency_mode_active(&self) -> bool {
        !self.emergency_mode_ends_after.is_zero()
    }

    pub fn is_emergency_protection_enabled(&self, now: Timestamp) -> bool {
        self.is_emergency_mode_active() || now <= self.protected_till
    }

    pub fn is_emergency_mode_passed(&self, now: Timestamp) -> bool {
        now > self.emergency_mode_ends_after
    }

    pub(crate) fn check_activation_committee(&self, caller: &Address) -> Result<(), TimelockError> {
        check_role(caller, self.activation_committee.as_ref(), "emergency activation committee")
    }

    pub(crate) fn check_execution_committee(&self, caller: &Address) -> Result<(), TimelockError> {
        check_role(caller, self.execution_committee.as_ref(), "emergency execution committee")
    }

    pub(crate) fn check_emergency_mode(&self, active: bool) -> Result<(), TimelockError> {
        match (active, self.is_emergency_mode_active()) {
            (true, false) => Err(TimelockError::EmergencyModeNotActive),
            (false, true) => Err(TimelockError::EmergencyModeActive),
            _ => Ok(()),
        }
    }

    pub(crate) fn activate(&mut self, now: Timestamp) -> Result<(), TimelockError> {
        self.check_emergency_mode(false)?;
        if now > self.protected_till {
            return Err(TimelockError::EmergencyProtectionExpired {
                protected_till: self.protected_till,
            });
        }
        self.emergency_mode_ends_after = now.checked_add(self.emergency_mode_duration)?;
        Ok(())
    }

    /// Drop emergency mode together with the whole protection setup.
    pub(crate) fn deactivate(&mut self) {
        *self = Self::default();
    }
}

fn check_role(
    caller: &Address,
    expected: Option<&Address>,
    role: &'static str,
) -> Result<(), TimelockError> {
    if expected != Some(caller) {
        return Err(TimelockError::Unauthorized {
            caller: caller.clone(),
            role,
        });
    }
    Ok(())
}
