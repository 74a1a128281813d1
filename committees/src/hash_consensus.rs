//! N-of-M voting on action hashes with a post-quorum timelock.
//!
//! A hash becomes executable once at least `quorum` current members approve
//! it and `timelock_duration` has elapsed since the quorum was first
//! reached. Execution marks the hash used; a used hash accepts no further
//! votes and can never be executed again.

use crate::error::CommitteeError;
use dualgov_types::{ActionHash, Address, Duration, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct HashState {
    quorum_at: Timestamp,
    used_at: Timestamp,
}

/// Snapshot of one hash's tally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStatus {
    pub support: usize,
    pub quorum: usize,
    pub quorum_at: Timestamp,
    pub used_at: Timestamp,
}

impl HashStatus {
    pub fn is_used(&self) -> bool {
        !self.used_at.is_zero()
    }
}

#[derive(Clone, Debug)]
pub struct HashConsensus {
    owner: Address,
    members: Vec<Address>,
    quorum: usize,
    timelock_duration: Duration,
    hashes: HashMap<ActionHash, HashState>,
    /// Approving members per hash. Entries of removed members are kept but
    /// not counted.
    approvals: HashMap<ActionHash, HashSet<Address>>,
}

impl HashConsensus {
    pub fn new(
        owner: Address,
        members: Vec<Address>,
        quorum: usize,
        timelock_duration: Duration,
    ) -> Result<Self, CommitteeError> {
        let mut seen = HashSet::new();
        for member in &members {
            if !seen.insert(member) {
                return Err(CommitteeError::AlreadyMember(member.clone()));
            }
        }
        check_quorum(quorum, members.len())?;
        Ok(Self {
            owner,
            members,
            quorum,
            timelock_duration,
            hashes: HashMap::new(),
            approvals: HashMap::new(),
        })
    }

    /// Record `member`'s stance on `hash`. Casting the stance already on
    /// record changes nothing.
    pub fn vote(
        &mut self,
        member: &Address,
        hash: ActionHash,
        support: bool,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        if !self.is_member(member) {
            return Err(CommitteeError::NotMember(member.clone()));
        }
        let state = self.state(&hash);
        if !state.used_at.is_zero() {
            return Err(CommitteeError::HashAlreadyUsed(hash));
        }
        if self.has_approved(member, &hash) == support {
            return Ok(());
        }

        let voters = self.approvals.entry(hash).or_default();
        if support {
            voters.insert(member.clone());
        } else {
            voters.remove(member);
        }
        let tally = self.support(&hash);
        tracing::debug!(%member, %hash, support, tally, quorum = self.quorum, "committee vote");
        if state.quorum_at.is_zero() && tally >= self.quorum {
            self.hashes.insert(hash, HashState { quorum_at: now, ..state });
            tracing::debug!(%hash, "quorum reached");
        }
        Ok(())
    }

    /// Number of current members approving `hash`.
    pub fn support(&self, hash: &ActionHash) -> usize {
        self.approvals.get(hash).map_or(0, |voters| {
            self.members.iter().filter(|m| voters.contains(*m)).count()
        })
    }

    pub fn has_approved(&self, member: &Address, hash: &ActionHash) -> bool {
        self.approvals
            .get(hash)
            .is_some_and(|voters| voters.contains(member))
    }

    pub fn hash_status(&self, hash: &ActionHash) -> HashStatus {
        let state = self.state(hash);
        HashStatus {
            support: self.support(hash),
            quorum: self.quorum,
            quorum_at: state.quorum_at,
            used_at: state.used_at,
        }
    }

    /// Fails unless `hash` could be marked used at `now`.
    pub fn check_executable(&self, hash: &ActionHash, now: Timestamp) -> Result<(), CommitteeError> {
        let state = self.state(hash);
        if !state.used_at.is_zero() {
            return Err(CommitteeError::HashAlreadyUsed(*hash));
        }
        let support = self.support(hash);
        if support == 0 || support < self.quorum || state.quorum_at.is_zero() {
            return Err(CommitteeError::QuorumNotReached {
                hash: *hash,
                support,
                quorum: self.quorum,
            });
        }
        let available_at = state.quorum_at.checked_add(self.timelock_duration)?;
        if now < available_at {
            return Err(CommitteeError::TimelockNotPassed {
                hash: *hash,
                available_at,
            });
        }
        Ok(())
    }

    pub fn mark_used(&mut self, hash: &ActionHash, now: Timestamp) -> Result<(), CommitteeError> {
        self.check_executable(hash, now)?;
        let state = self.state(hash);
        self.hashes.insert(*hash, HashState { used_at: now, ..state });
        Ok(())
    }

    // ── Owner operations ───────────────────────────────────────────────

    /// Add members and set the quorum for the enlarged committee.
    pub fn add_members(
        &mut self,
        caller: &Address,
        new_members: &[Address],
        quorum: usize,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        self.check_owner(caller)?;
        let mut seen = HashSet::new();
        for member in new_members {
            if self.is_member(member) || !seen.insert(member) {
                return Err(CommitteeError::AlreadyMember(member.clone()));
            }
        }
        check_quorum(quorum, self.members.len() + new_members.len())?;

        self.members.extend_from_slice(new_members);
        self.quorum = quorum;
        self.stamp_reached_quorums(now);
        tracing::info!(added = new_members.len(), quorum, "committee members added");
        Ok(())
    }

    /// Remove members and set the quorum for the reduced committee.
    pub fn remove_members(
        &mut self,
        caller: &Address,
        removed: &[Address],
        quorum: usize,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        self.check_owner(caller)?;
        let mut seen = HashSet::new();
        for member in removed {
            if !self.is_member(member) || !seen.insert(member) {
                return Err(CommitteeError::NotMember(member.clone()));
            }
        }
        check_quorum(quorum, self.members.len() - removed.len())?;

        self.members.retain(|m| !seen.contains(m));
        self.quorum = quorum;
        self.stamp_reached_quorums(now);
        tracing::info!(removed = removed.len(), quorum, "committee members removed");
        Ok(())
    }

    pub fn set_quorum(
        &mut self,
        caller: &Address,
        quorum: usize,
        now: Timestamp,
    ) -> Result<(), CommitteeError> {
        self.check_owner(caller)?;
        check_quorum(quorum, self.members.len())?;
        self.quorum = quorum;
        self.stamp_reached_quorums(now);
        Ok(())
    }

    pub fn set_timelock_duration(
        &mut self,
        caller: &Address,
        duration: Duration,
    ) -> Result<(), CommitteeError> {
        self.check_owner(caller)?;
        self.timelock_duration = duration;
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn members(&self) -> &[Address] {
        &self.members
    }

    pub fn is_member(&self, account: &Address) -> bool {
        self.members.contains(account)
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn timelock_duration(&self) -> Duration {
        self.timelock_duration
    }

    fn state(&self, hash: &ActionHash) -> HashState {
        self.hashes.get(hash).copied().unwrap_or_default()
    }

    fn check_owner(&self, caller: &Address) -> Result<(), CommitteeError> {
        if *caller != self.owner {
            return Err(CommitteeError::Unauthorized {
                caller: caller.clone(),
                role: "committee owner",
            });
        }
        Ok(())
    }

    /// A membership or quorum change can bring pending hashes to quorum
    /// without a vote; their timelock starts now.
    fn stamp_reached_quorums(&mut self, now: Timestamp) {
        let reached: Vec<ActionHash> = self
            .approvals
            .keys()
            .filter(|hash| {
                let state = self.state(hash);
                state.used_at.is_zero()
                    && state.quorum_at.is_zero()
                    && self.support(hash) >= self.quorum
            })
            .copied()
            .collect();
        for hash in reached {
            let state = self.state(&hash);
            self.hashes.insert(hash, HashState { quorum_at: now, ..state });
        }
    }
}

fn check_quorum(quorum: usize, members: usize) -> Result<(), CommitteeError> {
    if quorum == 0 || quorum > members {
        return Err(CommitteeError::InvalidQuorum { quorum, members });
    }
    Ok(())
}
