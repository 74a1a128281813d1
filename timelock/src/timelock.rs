//! The emergency-protected timelock: the single entry point proposals pass
//! through on their way to execution.

use crate::config::{check_bound, TimelockConfig};
use crate::emergency::EmergencyProtection;
use crate::error::TimelockError;
use crate::proposals::{ExecutorCall, Proposal, ProposalStatus, Proposals};
use dualgov_types::{Address, Duration, Timestamp};

/// Parameters for [`EmergencyProtectedTimelock::set_emergency_protection`].
#[derive(Clone, Debug)]
pub struct EmergencyProtectionSetup {
    pub activation_committee: Address,
    pub execution_committee: Address,
    pub emergency_governance: Address,
    pub protection_duration: Duration,
    pub emergency_mode_duration: Duration,
}

#[derive(Clone, Debug)]
pub struct EmergencyProtectedTimelock {
    proposals: Proposals,
    governance: Address,
    admin_executor: Address,
    config: TimelockConfig,
    emergency: EmergencyProtection,
}

impl EmergencyProtectedTimelock {
    pub fn new(
        governance: Address,
        admin_executor: Address,
        config: TimelockConfig,
    ) -> Result<Self, TimelockError> {
        config.validate()?;
        Ok(Self {
            proposals: Proposals::new(),
            governance,
            admin_executor,
            config,
            emergency: EmergencyProtection::default(),
        })
    }

    // ── Proposal lifecycle ─────────────────────────────────────────────

    pub fn submit(
        &mut self,
        caller: &Address,
        executor: Address,
        calls: Vec<ExecutorCall>,
        now: Timestamp,
    ) -> Result<u64, TimelockError> {
        self.check_governance(caller)?;
        let call_count = calls.len();
        let id = self.proposals.submit(executor.clone(), calls, now)?;
        tracing::info!(proposal_id = id, %executor, calls = call_count, "proposal submitted");
        Ok(id)
    }

    pub fn schedule(
        &mut self,
        caller: &Address,
        id: u64,
        now: Timestamp,
    ) -> Result<(), TimelockError> {
        self.check_governance(caller)?;
        self.proposals
            .schedule(id, self.config.after_submit_delay, now)?;
        tracing::info!(proposal_id = id, "proposal scheduled");
        Ok(())
    }

    /// Execute a scheduled proposal. Open to anyone once the delay passed,
    /// but blocked while emergency mode is active.
    pub fn execute(&mut self, id: u64, now: Timestamp) -> Result<Proposal, TimelockError> {
        self.emergency.check_emergency_mode(false)?;
        let proposal = self
            .proposals
            .execute(id, self.config.after_schedule_delay, now)?;
        tracing::info!(proposal_id = id, executor = %proposal.executor, "proposal executed");
        Ok(proposal)
    }

    pub fn cancel(
        &mut self,
        caller: &Address,
        id: u64,
        now: Timestamp,
    ) -> Result<bool, TimelockError> {
        self.check_governance(caller)?;
        let cancelled = self.proposals.cancel(id, now)?;
        if cancelled {
            tracing::info!(proposal_id = id, "proposal cancelled");
        }
        Ok(cancelled)
    }

    pub fn cancel_all_non_executed_proposals(
        &mut self,
        caller: &Address,
    ) -> Result<(), TimelockError> {
        self.check_governance(caller)?;
        self.cancel_all();
        Ok(())
    }

    pub fn can_schedule(&self, id: u64, now: Timestamp) -> bool {
        self.proposals
            .can_schedule(id, self.config.after_submit_delay, now)
    }

    pub fn can_execute(&self, id: u64, now: Timestamp) -> bool {
        !self.emergency.is_emergency_mode_active()
            && self
                .proposals
                .can_execute(id, self.config.after_schedule_delay, now)
    }

    // ── Emergency protection ───────────────────────────────────────────

    pub fn activate_emergency_mode(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<(), TimelockError> {
        self.emergency.check_activation_committee(caller)?;
        self.emergency.activate(now)?;
        tracing::info!(
            ends_after = %self.emergency.emergency_mode_ends_after,
            "emergency mode activated"
        );
        Ok(())
    }

    /// Execute a scheduled proposal during emergency mode, ignoring the
    /// after-schedule delay.
    pub fn emergency_execute(
        &mut self,
        caller: &Address,
        id: u64,
        now: Timestamp,
    ) -> Result<Proposal, TimelockError> {
        self.emergency.check_emergency_mode(true)?;
        self.emergency.check_execution_committee(caller)?;
        let proposal = self.proposals.execute(id, Duration::ZERO, now)?;
        tracing::info!(proposal_id = id, "proposal emergency-executed");
        Ok(proposal)
    }

    /// Leave emergency mode. The admin executor may do so at any time;
    /// anyone else only once the emergency mode duration has passed.
    pub fn deactivate_emergency_mode(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<(), TimelockError> {
        self.emergency.check_emergency_mode(true)?;
        if *caller != self.admin_executor && !self.emergency.is_emergency_mode_passed(now) {
            return Err(TimelockError::EmergencyModeNotPassed {
                ends_after: self.emergency.emergency_mode_ends_after,
            });
        }
        self.emergency.deactivate();
        self.cancel_all();
        tracing::info!("emergency mode deactivated");
        Ok(())
    }

    /// Hand governance to the emergency governance and drop every pending
    /// proposal.
    pub fn emergency_reset(&mut self, caller: &Address) -> Result<(), TimelockError> {
        self.emergency.check_emergency_mode(true)?;
        self.emergency.check_execution_committee(caller)?;
        let emergency_governance = self
            .emergency
            .emergency_governance
            .clone()
            .ok_or(TimelockError::EmergencyModeNotActive)?;
        self.governance = emergency_governance;
        self.emergency.deactivate();
        self.cancel_all();
        tracing::info!(governance = %self.governance, "emergency reset performed");
        Ok(())
    }

    pub fn set_emergency_protection(
        &mut self,
        caller: &Address,
        setup: EmergencyProtectionSetup,
        now: Timestamp,
    ) -> Result<(), TimelockError> {
        self.check_admin_executor(caller)?;
        self.emergency.check_emergency_mode(false)?;
        check_bound(
            "protection_duration",
            setup.protection_duration,
            self.config.max_emergency_protection_duration,
        )?;
        check_bound(
            "emergency_mode_duration",
            setup.emergency_mode_duration,
            self.config.max_emergency_mode_duration,
        )?;
        self.emergency = EmergencyProtection {
            activation_committee: Some(setup.activation_committee),
            execution_committee: Some(setup.execution_committee),
            emergency_governance: Some(setup.emergency_governance),
            protected_till: now.checked_add(setup.protection_duration)?,
            emergency_mode_duration: setup.emergency_mode_duration,
            emergency_mode_ends_after: Timestamp::ZERO,
        };
        Ok(())
    }

    // ── Admin ──────────────────────────────────────────────────────────

    /// Replace the governance address. Pending proposals of the old
    /// governance are cancelled.
    pub fn set_governance(
        &mut self,
        caller: &Address,
        governance: Address,
    ) -> Result<(), TimelockError> {
        self.check_admin_executor(caller)?;
        if governance == self.governance {
            return Ok(());
        }
        self.governance = governance;
        self.cancel_all();
        Ok(())
    }

    pub fn set_after_submit_delay(
        &mut self,
        caller: &Address,
        delay: Duration,
    ) -> Result<(), TimelockError> {
        self.check_admin_executor(caller)?;
        check_bound("after_submit_delay", delay, self.config.max_after_submit_delay)?;
        self.config.after_submit_delay = delay;
        Ok(())
    }

    pub fn set_after_schedule_delay(
        &mut self,
        caller: &Address,
        delay: Duration,
    ) -> Result<(), TimelockError> {
        self.check_admin_executor(caller)?;
        check_bound(
            "after_schedule_delay",
            delay,
            self.config.max_after_schedule_delay,
        )?;
        self.config.after_schedule_delay = delay;
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn proposal(&self, id: u64) -> Result<Proposal, TimelockError> {
        self.proposals.get(id)
    }

    pub fn proposal_status(&self, id: u64) -> ProposalStatus {
        self.proposals.status(id)
    }

    pub fn proposals_count(&self) -> u64 {
        self.proposals.count()
    }

    pub fn governance(&self) -> &Address {
        &self.governance
    }

    pub fn admin_executor(&self) -> &Address {
        &self.admin_executor
    }

    pub fn config(&self) -> &TimelockConfig {
        &self.config
    }

    pub fn emergency_protection(&self) -> &EmergencyProtection {
        &self.emergency
    }

    pub fn is_emergency_mode_active(&self) -> bool {
        self.emergency.is_emergency_mode_active()
    }

    pub fn is_emergency_protection_enabled(&self, now: Timestamp) -> bool {
        self.emergency.is_emergency_protection_enabled(now)
    }

    fn cancel_all(&mut self) {
        self.proposals.cancel_all();
        tracing::info!(
            last_cancelled_proposal_id = self.proposals.last_cancelled_proposal_id(),
            "all non-executed proposals cancelled"
        );
    }

    fn check_governance(&self, caller: &Address) -> Result<(), TimelockError> {
        if *caller != self.governance {
            return Err(TimelockError::Unauthorized {
                caller: caller.clone(),
                role: "governance",
            });
        }
        Ok(())
    }

    fn check_admin_executor(&self, caller: &Address) -> Result<(), TimelockError> {
        if *caller != self.admin_executor {
            return Err(TimelockError::Unauthorized {
                caller: caller.clone(),
                role: "admin executor",
            });
        }
        Ok(())
    }
}
