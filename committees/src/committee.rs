//! The part every committee shares: an address the governance knows it by,
//! the hash consensus, and the list of proposed actions.

use crate::action::CommitteeAction;
use crate::error::CommitteeError;
use crate::hash_consensus::{HashConsensus, HashStatus};
use crate::proposals_list::ProposalsList;
use dualgov_types::{ActionHash, Address, Duration, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action: CommitteeAction,
    pub proposed_at: Timestamp,
}

#[derive(Clone, Debug)]
pub struct Committee {
    address: Address,
    consensus: HashConsensus,
    proposals: ProposalsList<ProposedAction>,
}

impl Committee {
    pub fn new(
        address: Address,
        owner: Address,
        members: Vec<Address>,
        quorum: usize,
        timelock_duration: Duration,
    ) -> Result<Self, CommitteeError> {
        Ok(Self {
            address,
            consensus: HashConsensus::new(owner, members, quorum, timelock_duration)?,
            proposals: ProposalsList::new(),
        })
    }

    /// Vote on `action`, recording it in the proposals list the first time
    /// anyone supports it.
    pub(crate) fn vote(
        &mut self,
        member: &Address,
        action: CommitteeAction,
        support: bool,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        let hash = action.hash();
        self.consensus.vote(member, hash, support, now)?;
        if support {
            self.proposals.push(
                hash,
                ProposedAction {
                    action,
                    proposed_at: now,
                },
            );
        }
        Ok(hash)
    }

    pub(crate) fn check_executable(
        &self,
        action: &CommitteeAction,
        now: Timestamp,
    ) -> Result<ActionHash, CommitteeError> {
        let hash = action.hash();
        self.consensus.check_executable(&hash, now)?;
        Ok(hash)
    }

    pub(crate) fn mark_executed(
        &mut self,
        hash: &ActionHash,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        self.consensus.mark_used(hash, now)?;
        tracing::info!(committee = %self.address, %hash, "committee action executed");
        Ok(())
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn consensus(&self) -> &HashConsensus {
        &self.consensus
    }

    pub fn add_members(
        &mut self,
        caller: &Address,
        members: &[Address],
        quorum: usize,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        self.consensus.add_members(caller, members, quorum, now)
    }

    pub fn remove_members(
        &mut self,
        caller: &Address,
        members: &[Address],
        quorum: usize,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        self.consensus.remove_members(caller, members, quorum, now)
    }

    pub fn set_quorum(
        &mut self,
        caller: &Address,
        quorum: usize,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        self.consensus.set_quorum(caller, quorum, now)
    }

    pub fn set_timelock_duration(
        &mut self,
        caller: &Address,
        duration: Duration,
    ) -> Result<(), CommitteeError> {
        self.consensus.set_timelock_duration(caller, duration)
    }

    pub fn proposals(&self) -> &ProposalsList<ProposedAction> {
        &self.proposals
    }

    pub fn action_status(&self, action: &CommitteeAction) -> HashStatus {
        self.consensus.hash_status(&action.hash())
    }
}
