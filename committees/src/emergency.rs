//! Emergency committees acting on the timelock's emergency protection.

use crate::action::CommitteeAction;
use crate::committee::Committee;
use crate::error::CommitteeError;
use dualgov_timelock::{EmergencyProtectedTimelock, Proposal};
use dualgov_types::{ActionHash, Address, Timestamp};

/// Puts the timelock into emergency mode. The action has a fixed hash, so
/// a committee can activate emergency mode once in its lifetime.
#[derive(Clone, Debug)]
pub struct EmergencyActivationCommittee {
    committee: Committee,
}

impl EmergencyActivationCommittee {
    pub fn new(committee: Committee) -> Self {
        Self { committee }
    }

    pub fn approve_activate_emergency_mode(
        &mut self,
        member: &Address,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        self.committee
            .vote(member, CommitteeAction::ActivateEmergencyMode, true, now)
    }

    pub fn execute_activate_emergency_mode(
        &mut self,
        timelock: &mut EmergencyProtectedTimelock,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        let hash = self
            .committee
            .check_executable(&CommitteeAction::ActivateEmergencyMode, now)?;
        timelock.activate_emergency_mode(self.committee.address(), now)?;
        self.committee.mark_executed(&hash, now)
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn committee_mut(&mut self) -> &mut Committee {
        &mut self.committee
    }
}

/// Executes proposals during emergency mode, or resets governance to the
/// emergency governance.
#[derive(Clone, Debug)]
pub struct EmergencyExecutionCommittee {
    committee: Committee,
}

impl EmergencyExecutionCommittee {
    pub fn new(committee: Committee) -> Self {
        Self { committee }
    }

    pub fn vote_emergency_execute(
        &mut self,
        member: &Address,
        proposal_id: u64,
        support: bool,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        self.committee.vote(
            member,
            CommitteeAction::EmergencyExecute { proposal_id },
            support,
            now,
        )
    }

    pub fn execute_emergency_execute(
        &mut self,
        timelock: &mut EmergencyProtectedTimelock,
        proposal_id: u64,
        now: Timestamp,
    ) -> Result<Proposal, CommitteeError> {
        let hash = self
            .committee
            .check_executable(&CommitteeAction::EmergencyExecute { proposal_id }, now)?;
        let proposal = timelock.emergency_execute(self.committee.address(), proposal_id, now)?;
        self.committee.mark_executed(&hash, now)?;
        Ok(proposal)
    }

    pub fn approve_emergency_reset(
        &mut self,
        member: &Address,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        self.committee
            .vote(member, CommitteeAction::EmergencyReset, true, now)
    }

    pub fn execute_emergency_reset(
        &mut self,
        timelock: &mut EmergencyProtectedTimelock,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        let hash = self
            .committee
            .check_executable(&CommitteeAction::EmergencyReset, now)?;
        timelock.emergency_reset(self.committee.address())?;
        self.committee.mark_executed(&hash, now)
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn committee_mut(&mut self) -> &mut Committee {
        &mut self.committee
    }
}
