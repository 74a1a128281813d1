//! The dual governance state machine.
//!
//! [`DualGovernanceStateMachine::next_state`] is a pure function of the
//! stored timestamps, the signalling escrow's rage-quit support and the
//! current time. Side effects of a phase change are applied by
//! [`DualGovernanceStateMachine::enter`]; the escrow swap on entering rage
//! quit is driven by the facade, which owns the escrows.

use crate::config::DualGovernanceConfig;
use dualgov_types::{PercentD16, Timestamp};
use serde::{Deserialize, Serialize};

pub const MAX_RAGE_QUIT_ROUND: u8 = u8::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GovernanceState {
    Normal,
    VetoSignalling,
    VetoSignallingDeactivation,
    VetoCooldown,
    RageQuit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DualGovernanceStateMachine {
    state: GovernanceState,
    entered_at: Timestamp,
    veto_signalling_activated_at: Timestamp,
    veto_signalling_reactivated_at: Timestamp,
    normal_or_veto_cooldown_exited_at: Timestamp,
    rage_quit_round: u8,
    signalling_escrow: usize,
    rage_quit_escrow: Option<usize>,
}

impl DualGovernanceStateMachine {
    pub fn new(signalling_escrow: usize, now: Timestamp) -> Self {
        Self {
            state: GovernanceState::Normal,
            entered_at: now,
            veto_signalling_activated_at: Timestamp::ZERO,
            veto_signalling_reactivated_at: Timestamp::ZERO,
            normal_or_veto_cooldown_exited_at: Timestamp::ZERO,
            rage_quit_round: 0,
            signalling_escrow,
            rage_quit_escrow: None,
        }
    }

    /// Phase the machine should be in at `now`. Equal to the current phase
    /// when no transition is due.
    pub fn next_state(
        &self,
        config: &DualGovernanceConfig,
        support: PercentD16,
        rage_quit_finalized: bool,
        now: Timestamp,
    ) -> GovernanceState {
        use GovernanceState::*;

        let first_seal_crossed = support > config.first_seal_rage_quit_support;
        let second_seal_crossed = support > config.second_seal_rage_quit_support;
        match self.state {
            Normal => {
                if first_seal_crossed {
                    VetoSignalling
                } else {
                    Normal
                }
            }
            VetoSignalling => {
                if !self.is_dynamic_timelock_passed(config, support, now) {
                    VetoSignalling
                } else if second_seal_crossed {
                    RageQuit
                } else if self.is_min_active_duration_passed(config, now) {
                    VetoSignallingDeactivation
                } else {
                    VetoSignalling
                }
            }
            VetoSignallingDeactivation => {
                if !self.is_dynamic_timelock_passed(config, support, now) {
                    VetoSignalling
                } else if second_seal_crossed {
                    RageQuit
                } else if self
                    .entered_at
                    .has_passed(config.veto_signalling_deactivation_max_duration, now)
                {
                    VetoCooldown
                } else {
                    VetoSignallingDeactivation
                }
            }
            VetoCooldown => {
                if !self.entered_at.has_passed(config.veto_cooldown_duration, now) {
                    VetoCooldown
                } else if first_seal_crossed {
                    VetoSignalling
                } else {
                    Normal
                }
            }
            RageQuit => {
                if !rage_quit_finalized {
                    RageQuit
                } else if first_seal_crossed {
                    VetoSignalling
                } else {
                    VetoCooldown
                }
            }
        }
    }

    /// Apply the timestamp and round bookkeeping of a phase change.
    /// Does nothing when `next` is the current phase.
    pub fn enter(&mut self, next: GovernanceState, now: Timestamp) {
        let previous = self.state;
        if previous == next {
            return;
        }
        self.state = next;
        self.entered_at = now;
        if matches!(
            previous,
            GovernanceState::Normal | GovernanceState::VetoCooldown
        ) {
            self.normal_or_veto_cooldown_exited_at = now;
        }
        match next {
            GovernanceState::Normal => self.rage_quit_round = 0,
            GovernanceState::VetoSignalling => {
                if previous == GovernanceState::VetoSignallingDeactivation {
                    self.veto_signalling_reactivated_at = now;
                } else {
                    self.veto_signalling_activated_at = now;
                }
            }
            _ => {}
        }
    }

    /// Retire the signalling escrow into the rage-quit slot, install its
    /// replacement and count the round.
    pub fn promote_rage_quit_escrow(&mut self, new_signalling_escrow: usize) {
        self.rage_quit_escrow = Some(self.signalling_escrow);
        self.signalling_escrow = new_signalling_escrow;
        self.rage_quit_round = self.rage_quit_round.saturating_add(1).min(MAX_RAGE_QUIT_ROUND);
    }

    pub fn is_proposals_creation_allowed(&self) -> bool {
        !matches!(
            self.state,
            GovernanceState::VetoSignallingDeactivation | GovernanceState::VetoCooldown
        )
    }

    pub fn is_proposals_adoption_allowed(&self) -> bool {
        matches!(
            self.state,
            GovernanceState::Normal | GovernanceState::VetoCooldown
        )
    }

    /// Whether a proposal submitted at `submitted_at` may be scheduled now.
    /// During the cooldown only proposals that predate the last signalling
    /// activation qualify.
    pub fn can_adopt_proposal(&self, submitted_at: Timestamp) -> bool {
        match self.state {
            GovernanceState::Normal => true,
            GovernanceState::VetoCooldown => submitted_at <= self.veto_signalling_activated_at,
            _ => false,
        }
    }

    pub fn is_tiebreak(
        &self,
        config: &DualGovernanceConfig,
        withdrawal_blocker_paused: bool,
        now: Timestamp,
    ) -> bool {
        if self.is_proposals_adoption_allowed() {
            return false;
        }
        if self
            .normal_or_veto_cooldown_exited_at
            .has_expired(config.tiebreaker_activation_timeout, now)
        {
            return true;
        }
        self.state == GovernanceState::RageQuit && withdrawal_blocker_paused
    }

    fn is_dynamic_timelock_passed(
        &self,
        config: &DualGovernanceConfig,
        support: PercentD16,
        now: Timestamp,
    ) -> bool {
        self.veto_signalling_activated_at
            .has_passed(config.dynamic_timelock(support), now)
    }

    fn is_min_active_duration_passed(&self, config: &DualGovernanceConfig, now: Timestamp) -> bool {
        let since = self
            .veto_signalling_activated_at
            .max(self.veto_signalling_reactivated_at);
        since.has_passed(config.veto_signalling_min_active_duration, now)
    }

    pub fn state(&self) -> GovernanceState {
        self.state
    }

    pub fn entered_at(&self) -> Timestamp {
        self.entered_at
    }

    pub fn veto_signalling_activated_at(&self) -> Timestamp {
        self.veto_signalling_activated_at
    }

    pub fn veto_signalling_reactivated_at(&self) -> Timestamp {
        self.veto_signalling_reactivated_at
    }

    pub fn normal_or_veto_cooldown_exited_at(&self) -> Timestamp {
        self.normal_or_veto_cooldown_exited_at
    }

    pub fn rage_quit_round(&self) -> u8 {
        self.rage_quit_round
    }

    pub fn signalling_escrow(&self) -> usize {
        self.signalling_escrow
    }

    pub fn rage_quit_escrow(&self) -> Option<usize> {
        self.rage_quit_escrow
    }
}
