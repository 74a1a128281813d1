//! Tiebreaker committees.
//!
//! The core committee schedules proposals and resumes sealables through the
//! governance while a tiebreak is active. Its members are usually
//! sub-committees: each sub-committee reaches its own quorum and then casts
//! a single vote in the core.

use crate::action::CommitteeAction;
use crate::committee::Committee;
use crate::error::CommitteeError;
use dualgov_escrow::Lido;
use dualgov_governance::DualGovernance;
use dualgov_types::{ActionHash, Address, Timestamp};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct TiebreakerCoreCommittee {
    committee: Committee,
    /// Executed resumes per sealable, mixed into the action hash so the same
    /// sealable can be resumed again later.
    resume_nonces: HashMap<Address, u64>,
}

impl TiebreakerCoreCommittee {
    pub fn new(committee: Committee) -> Self {
        Self {
            committee,
            resume_nonces: HashMap::new(),
        }
    }

    pub fn schedule_proposal(
        &mut self,
        dg: &DualGovernance,
        member: &Address,
        proposal_id: u64,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        check_proposal_exists(dg, proposal_id)?;
        self.committee.vote(
            member,
            CommitteeAction::ScheduleProposal { proposal_id },
            true,
            now,
        )
    }

    pub fn execute_schedule_proposal<L: Lido + ?Sized>(
        &mut self,
        dg: &mut DualGovernance,
        lido: &L,
        proposal_id: u64,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        let hash = self
            .committee
            .check_executable(&CommitteeAction::ScheduleProposal { proposal_id }, now)?;
        dg.tiebreaker_schedule_proposal(lido, self.committee.address(), proposal_id, now)?;
        self.committee.mark_executed(&hash, now)
    }

    pub fn resume_nonce(&self, sealable: &Address) -> u64 {
        self.resume_nonces.get(sealable).copied().unwrap_or(0)
    }

    pub fn sealable_resume(
        &mut self,
        dg: &DualGovernance,
        member: &Address,
        sealable: &Address,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        check_sealable_registered(dg, sealable)?;
        let action = self.resume_action(sealable);
        self.committee.vote(member, action, true, now)
    }

    pub fn execute_sealable_resume<L: Lido + ?Sized>(
        &mut self,
        dg: &mut DualGovernance,
        lido: &L,
        sealable: &Address,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        let hash = self
            .committee
            .check_executable(&self.resume_action(sealable), now)?;
        dg.tiebreaker_resume_sealable(lido, self.committee.address(), sealable, now)?;
        self.committee.mark_executed(&hash, now)?;
        *self.resume_nonces.entry(sealable.clone()).or_insert(0) += 1;
        Ok(())
    }

    fn resume_action(&self, sealable: &Address) -> CommitteeAction {
        CommitteeAction::ResumeSealable {
            sealable: sealable.clone(),
            nonce: self.resume_nonce(sealable),
        }
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn committee_mut(&mut self) -> &mut Committee {
        &mut self.committee
    }
}

#[derive(Clone, Debug)]
pub struct TiebreakerSubCommittee {
    committee: Committee,
}

impl TiebreakerSubCommittee {
    pub fn new(committee: Committee) -> Self {
        Self { committee }
    }

    pub fn schedule_proposal(
        &mut self,
        dg: &DualGovernance,
        member: &Address,
        proposal_id: u64,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        check_proposal_exists(dg, proposal_id)?;
        self.committee.vote(
            member,
            CommitteeAction::ScheduleProposal { proposal_id },
            true,
            now,
        )
    }

    /// Cast this sub-committee's vote for `proposal_id` in the core.
    pub fn execute_schedule_proposal(
        &mut self,
        core: &mut TiebreakerCoreCommittee,
        dg: &DualGovernance,
        proposal_id: u64,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        let hash = self
            .committee
            .check_executable(&CommitteeAction::ScheduleProposal { proposal_id }, now)?;
        core.schedule_proposal(dg, self.committee.address(), proposal_id, now)?;
        self.committee.mark_executed(&hash, now)
    }

    /// Vote for resuming `sealable` at the core's current nonce for it.
    pub fn sealable_resume(
        &mut self,
        core: &TiebreakerCoreCommittee,
        dg: &DualGovernance,
        member: &Address,
        sealable: &Address,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        check_sealable_registered(dg, sealable)?;
        let action = core.resume_action(sealable);
        self.committee.vote(member, action, true, now)
    }

    pub fn execute_sealable_resume(
        &mut self,
        core: &mut TiebreakerCoreCommittee,
        dg: &DualGovernance,
        sealable: &Address,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        let hash = self
            .committee
            .check_executable(&core.resume_action(sealable), now)?;
        core.sealable_resume(dg, self.committee.address(), sealable, now)?;
        self.committee.mark_executed(&hash, now)
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn committee_mut(&mut self) -> &mut Committee {
        &mut self.committee
    }
}

fn check_proposal_exists(dg: &DualGovernance, proposal_id: u64) -> Result<(), CommitteeError> {
    dg.timelock()
        .proposal(proposal_id)
        .map(|_| ())
        .map_err(|_| CommitteeError::UnknownProposal(proposal_id))
}

fn check_sealable_registered(dg: &DualGovernance, sealable: &Address) -> Result<(), CommitteeError> {
    if !dg.sealables().is_registered(sealable) {
        return Err(CommitteeError::UnknownSealable(sealable.clone()));
    }
    Ok(())
}
