//! Append-only proposal records and their lifecycle.
//!
//! Proposals move Submitted → Scheduled → Executed, or to Cancelled from
//! either of the first two. Mass cancellation only advances a watermark id:
//! every non-executed proposal at or below it reads as Cancelled even though
//! its stored status was never touched.

use crate::error::TimelockError;
use dualgov_types::{Address, Duration, ETHValue, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    NotExist,
    Submitted,
    Scheduled,
    Executed,
    Cancelled,
}

/// One opaque call a proposal asks its executor to perform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorCall {
    pub target: Address,
    pub value: ETHValue,
    pub payload: Vec<u8>,
}

impl ExecutorCall {
    pub fn new(target: impl Into<Address>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            target: target.into(),
            value: ETHValue::ZERO,
            payload: payload.into(),
        }
    }
}

/// A proposal as seen by callers, with its effective status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub executor: Address,
    pub status: ProposalStatus,
    pub submitted_at: Timestamp,
    pub scheduled_at: Timestamp,
    pub executed_at: Timestamp,
    pub cancelled_at: Timestamp,
    pub calls: Vec<ExecutorCall>,
}

/// The proposal collection. Ids are one-based and sequential.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Proposals {
    records: Vec<Proposal>,
    last_cancelled_proposal_id: u64,
}

impl Proposals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn last_cancelled_proposal_id(&self) -> u64 {
        self.last_cancelled_proposal_id
    }

    /// Append a new proposal and return its id.
    pub fn submit(
        &mut self,
        executor: Address,
        calls: Vec<ExecutorCall>,
        now: Timestamp,
    ) -> Result<u64, TimelockError> {
        if calls.is_empty() {
            return Err(TimelockError::EmptyCalls);
        }
        let id = self.count() + 1;
        self.records.push(Proposal {
            id,
            executor,
            status: ProposalStatus::Submitted,
            submitted_at: now,
            scheduled_at: Timestamp::ZERO,
            executed_at: Timestamp::ZERO,
            cancelled_at: Timestamp::ZERO,
            calls,
        });
        Ok(id)
    }

    pub fn schedule(
        &mut self,
        id: u64,
        after_submit_delay: Duration,
        now: Timestamp,
    ) -> Result<(), TimelockError> {
        self.check_schedulable(id, after_submit_delay, now)?;
        let record = self.record_mut(id)?;
        record.status = ProposalStatus::Scheduled;
        record.scheduled_at = now;
        Ok(())
    }

    pub fn execute(
        &mut self,
        id: u64,
        after_schedule_delay: Duration,
        now: Timestamp,
    ) -> Result<Proposal, TimelockError> {
        self.check_executable(id, after_schedule_delay, now)?;
        let record = self.record_mut(id)?;
        record.status = ProposalStatus::Executed;
        record.executed_at = now;
        Ok(record.clone())
    }

    /// Cancel one proposal. Returns `false` when it was already executed or
    /// cancelled, in which case nothing changes.
    pub fn cancel(&mut self, id: u64, now: Timestamp) -> Result<bool, TimelockError> {
        match self.status(id) {
            ProposalStatus::NotExist => Err(TimelockError::ProposalNotFound(id)),
            ProposalStatus::Executed | ProposalStatus::Cancelled => Ok(false),
            ProposalStatus::Submitted | ProposalStatus::Scheduled => {
                let record = self.record_mut(id)?;
                record.status = ProposalStatus::Cancelled;
                record.cancelled_at = now;
                Ok(true)
            }
        }
    }

    /// Cancel every non-executed proposal submitted so far.
    pub fn cancel_all(&mut self) {
        self.last_cancelled_proposal_id = self.count();
    }

    /// Effective status, with the cancellation watermark applied.
    pub fn status(&self, id: u64) -> ProposalStatus {
        match self.record(id) {
            None => ProposalStatus::NotExist,
            Some(record) => {
                if record.status != ProposalStatus::Executed && self.is_marked_cancelled(id) {
                    ProposalStatus::Cancelled
                } else {
                    record.status
                }
            }
        }
    }

    pub fn get(&self, id: u64) -> Result<Proposal, TimelockError> {
        let record = self.record(id).ok_or(TimelockError::ProposalNotFound(id))?;
        let mut proposal = record.clone();
        proposal.status = self.status(id);
        Ok(proposal)
    }

    pub fn can_schedule(&self, id: u64, after_submit_delay: Duration, now: Timestamp) -> bool {
        self.check_schedulable(id, after_submit_delay, now).is_ok()
    }

    pub fn can_execute(&self, id: u64, after_schedule_delay: Duration, now: Timestamp) -> bool {
        self.check_executable(id, after_schedule_delay, now).is_ok()
    }

    fn check_schedulable(
        &self,
        id: u64,
        after_submit_delay: Duration,
        now: Timestamp,
    ) -> Result<(), TimelockError> {
        let record = self.expect_status(id, ProposalStatus::Submitted)?;
        let ready_at = record.submitted_at.checked_add(after_submit_delay)?;
        if now < ready_at {
            return Err(TimelockError::AfterSubmitDelayNotPassed { id, ready_at });
        }
        Ok(())
    }

    fn check_executable(
        &self,
        id: u64,
        after_schedule_delay: Duration,
        now: Timestamp,
    ) -> Result<(), TimelockError> {
        let record = self.expect_status(id, ProposalStatus::Scheduled)?;
        let ready_at = record.scheduled_at.checked_add(after_schedule_delay)?;
        if now < ready_at {
            return Err(TimelockError::AfterScheduleDelayNotPassed { id, ready_at });
        }
        Ok(())
    }

    fn expect_status(
        &self,
        id: u64,
        expected: ProposalStatus,
    ) -> Result<&Proposal, TimelockError> {
        let record = self.record(id).ok_or(TimelockError::ProposalNotFound(id))?;
        let actual = self.status(id);
        if actual != expected {
            return Err(TimelockError::UnexpectedProposalStatus {
                id,
                expected,
                actual,
            });
        }
        Ok(record)
    }

    fn is_marked_cancelled(&self, id: u64) -> bool {
        id <= self.last_cancelled_proposal_id
    }

    fn record(&self, id: u64) -> Option<&Proposal> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.records.get(index)
    }

    fn record_mut(&mut self, id: u64) -> Result<&mut Proposal, TimelockError> {
        id.checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.records.get_mut(i))
            .ok_or(TimelockError::ProposalNotFound(id))
    }
}
