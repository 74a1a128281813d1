//! The reseal committee turns temporary pauses into indefinite ones while
//! the governance is contested.

use crate::action::CommitteeAction;
use crate::committee::Committee;
use crate::error::CommitteeError;
use dualgov_escrow::Lido;
use dualgov_governance::DualGovernance;
use dualgov_types::{ActionHash, Address, Timestamp};

#[derive(Clone, Debug)]
pub struct ResealCommittee {
    committee: Committee,
    /// Executed reseals, mixed into the action hash.
    nonce: u64,
}

impl ResealCommittee {
    pub fn new(committee: Committee) -> Self {
        Self { committee, nonce: 0 }
    }

    pub fn vote_reseal(
        &mut self,
        member: &Address,
        sealables: &[Address],
        support: bool,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        if sealables.is_empty() {
            return Err(CommitteeError::EmptySealables);
        }
        let action = self.reseal_action(sealables);
        self.committee.vote(member, action, support, now)
    }

    pub fn execute_reseal<L: Lido + ?Sized>(
        &mut self,
        dg: &mut DualGovernance,
        lido: &L,
        sealables: &[Address],
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        let hash = self
            .committee
            .check_executable(&self.reseal_action(sealables), now)?;
        dg.reseal_sealables(lido, self.committee.address(), sealables, now)?;
        self.committee.mark_executed(&hash, now)?;
        self.nonce += 1;
        Ok(())
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    fn reseal_action(&self, sealables: &[Address]) -> CommitteeAction {
        CommitteeAction::Reseal {
            sealables: sealables.to_vec(),
            nonce: self.nonce,
        }
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn committee_mut(&mut self) -> &mut Committee {
        &mut self.committee
    }
}
