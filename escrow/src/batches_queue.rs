//! FIFO queue of the withdrawal requests a rage-quit escrow created for its
//! locked stETH.
//!
//! Ids are stored as packed [`SequentialBatch`] runs. A cursor tracks the
//! next id to claim, so batches can keep growing while earlier ids are being
//! claimed.

use crate::error::EscrowError;
use crate::lido::UnstEthId;
use dualgov_types::{SequentialBatch, ValueError, MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueState {
    #[default]
    Absent,
    Opened,
    Closed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ClaimCursor {
    batch_index: usize,
    offset: u16,
}

#[derive(Clone, Debug, Default)]
pub struct WithdrawalsBatchesQueue {
    state: QueueState,
    /// Last request id that existed when the queue was opened. Requests up
    /// to it must be finalized before the escrow's own ones can be.
    boundary_unsteth_id: UnstEthId,
    batches: Vec<SequentialBatch>,
    total_count: u64,
    total_claimed: u64,
    cursor: ClaimCursor,
}

impl WithdrawalsBatchesQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, boundary_unsteth_id: UnstEthId) -> Result<(), EscrowError> {
        self.check_state(QueueState::Absent, "absent")?;
        self.state = QueueState::Opened;
        self.boundary_unsteth_id = boundary_unsteth_id;
        Ok(())
    }

    /// Append strictly increasing, contiguous ids. A run that directly
    /// follows the last batch is merged into it while capacity allows.
    pub fn add_unsteth_ids(&mut self, ids: &[UnstEthId]) -> Result<(), EscrowError> {
        self.check_state(QueueState::Opened, "opened")?;
        let (Some(&first), Some(&last)) = (ids.first(), ids.last()) else {
            return Ok(());
        };
        for pair in ids.windows(2) {
            if pair[0].checked_add(1) != Some(pair[1]) {
                return Err(EscrowError::NonSequentialIds {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        let queued_last = self
            .batches
            .last()
            .map_or(self.boundary_unsteth_id, |batch| batch.last());
        if first <= queued_last {
            return Err(EscrowError::IdsNotIncreasing {
                last: queued_last,
                next: first,
            });
        }
        let count = last - first + 1;
        let total_count = self
            .total_count
            .checked_add(count)
            .ok_or(ValueError::Overflow)?;

        let mut next = first;
        let mut remaining = count;
        let mut new_batches = Vec::new();
        if let Some(tail) = self.batches.last() {
            let take = remaining.min(tail.capacity() as u64) as u16;
            if take > 0 && tail.last() + 1 == next {
                let merged = tail.merge(&SequentialBatch::new(next, take)?)?;
                new_batches.push((true, merged));
                next += take as u64;
                remaining -= take as u64;
            }
        }
        while remaining > 0 {
            let size = remaining.min(MAX_BATCH_SIZE as u64) as u16;
            new_batches.push((false, SequentialBatch::new(next, size)?));
            next += size as u64;
            remaining -= size as u64;
        }

        for (replaces_tail, batch) in new_batches {
            if replaces_tail {
                if let Some(tail) = self.batches.last_mut() {
                    *tail = batch;
                }
            } else {
                self.batches.push(batch);
            }
        }
        self.total_count = total_count;
        Ok(())
    }

    /// Ids the next [`claim_next_batch`](Self::claim_next_batch) call would
    /// return, without moving the cursor.
    pub fn peek_next_batch(&self, max_count: usize) -> Result<Vec<UnstEthId>, EscrowError> {
        if self.state == QueueState::Absent {
            return Err(EscrowError::UnexpectedQueueState {
                expected: "opened or closed",
                actual: self.state,
            });
        }
        Ok(self.collect(max_count).0)
    }

    /// Take up to `max_count` ids in FIFO order and advance the cursor.
    pub fn claim_next_batch(&mut self, max_count: usize) -> Result<Vec<UnstEthId>, EscrowError> {
        if self.state == QueueState::Absent {
            return Err(EscrowError::UnexpectedQueueState {
                expected: "opened or closed",
                actual: self.state,
            });
        }
        let (ids, cursor) = self.collect(max_count);
        self.cursor = cursor;
        self.total_claimed += ids.len() as u64;
        Ok(ids)
    }

    pub fn close(&mut self) -> Result<(), EscrowError> {
        self.check_state(QueueState::Opened, "opened")?;
        self.state = QueueState::Closed;
        Ok(())
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == QueueState::Closed
    }

    pub fn is_all_batches_claimed(&self) -> bool {
        self.total_claimed == self.total_count
    }

    pub fn boundary_unsteth_id(&self) -> UnstEthId {
        self.boundary_unsteth_id
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_claimed(&self) -> u64 {
        self.total_claimed
    }

    pub fn unclaimed_count(&self) -> u64 {
        self.total_count - self.total_claimed
    }

    pub fn batches(&self) -> &[SequentialBatch] {
        &self.batches
    }

    fn collect(&self, max_count: usize) -> (Vec<UnstEthId>, ClaimCursor) {
        let mut ids = Vec::new();
        let mut cursor = self.cursor;
        while ids.len() < max_count {
            let Some(batch) = self.batches.get(cursor.batch_index) else {
                break;
            };
            if cursor.offset == batch.size() {
                // Stay on a drained tail batch: it may still be extended.
                if cursor.batch_index + 1 == self.batches.len() {
                    break;
                }
                cursor.batch_index += 1;
                cursor.offset = 0;
                continue;
            }
            let wanted = (max_count - ids.len()).min(u16::MAX as usize) as u16;
            let take = wanted.min(batch.size() - cursor.offset);
            ids.extend((0..take).filter_map(|k| batch.id_at(cursor.offset + k)));
            cursor.offset += take;
        }
        (ids, cursor)
    }

    fn check_state(&self, expected: QueueState, name: &'static str) -> Result<(), EscrowError> {
        if self.state != expected {
            return Err(EscrowError::UnexpectedQueueState {
                expected: name,
                actual: self.state,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn opened(boundary: UnstEthId) -> WithdrawalsBatchesQueue {
        let mut queue = WithdrawalsBatchesQueue::new();
        queue.open(boundary).unwrap();
        queue
    }

    #[test]
    fn cannot_reopen_or_add_when_closed() {
        let mut queue = opened(10);
        assert!(queue.open(20).is_err());
        queue.close().unwrap();
        assert!(queue.add_unsteth_ids(&[11]).is_err());
        assert!(queue.close().is_err());
    }

    #[test]
    fn claiming_requires_an_opened_queue() {
        let mut queue = WithdrawalsBatchesQueue::new();
        assert!(queue.claim_next_batch(1).is_err());
    }

    #[test]
    fn contiguous_runs_are_merged() {
        let mut queue = opened(10);
        queue.add_unsteth_ids(&[11, 12, 13]).unwrap();
        queue.add_unsteth_ids(&[14, 15]).unwrap();
        queue.add_unsteth_ids(&[20]).unwrap();
        assert_eq!(queue.batches().len(), 2);
        assert_eq!(queue.batches()[0].last(), 15);
        assert_eq!(queue.total_count(), 6);
    }

    #[test]
    fn rejects_gaps_and_stale_ids() {
        let mut queue = opened(10);
        assert!(matches!(
            queue.add_unsteth_ids(&[11, 13]),
            Err(EscrowError::NonSequentialIds { previous: 11, next: 13 })
        ));
        assert!(matches!(
            queue.add_unsteth_ids(&[10]),
            Err(EscrowError::IdsNotIncreasing { .. })
        ));
        queue.add_unsteth_ids(&[11, 12]).unwrap();
        assert!(queue.add_unsteth_ids(&[12]).is_err());
        assert_eq!(queue.total_count(), 2);
    }

    #[test]
    fn claims_in_fifo_order_across_batches() {
        let mut queue = opened(0);
        queue.add_unsteth_ids(&[1, 2, 3]).unwrap();
        queue.add_unsteth_ids(&[7, 8]).unwrap();

        assert_eq!(queue.peek_next_batch(4).unwrap(), vec![1, 2, 3, 7]);
        assert_eq!(queue.claim_next_batch(2).unwrap(), vec![1, 2]);
        assert_eq!(queue.claim_next_batch(10).unwrap(), vec![3, 7, 8]);
        assert!(queue.claim_next_batch(10).unwrap().is_empty());
        assert!(queue.is_all_batches_claimed());
    }

    #[test]
    fn drained_tail_picks_up_merged_ids() {
        let mut queue = opened(0);
        queue.add_unsteth_ids(&[1, 2]).unwrap();
        assert_eq!(queue.claim_next_batch(5).unwrap(), vec![1, 2]);
        queue.add_unsteth_ids(&[3, 4]).unwrap();
        assert_eq!(queue.batches().len(), 1);
        assert!(!queue.is_all_batches_claimed());
        assert_eq!(queue.claim_next_batch(5).unwrap(), vec![3, 4]);
        assert_eq!(queue.total_claimed(), queue.total_count());
    }

    #[test]
    fn oversized_runs_are_split() {
        let mut queue = opened(0);
        let ids: Vec<UnstEthId> = (1..=MAX_BATCH_SIZE as u64 + 5).collect();
        queue.add_unsteth_ids(&ids).unwrap();
        assert_eq!(queue.batches().len(), 2);
        assert_eq!(queue.batches()[1].size(), 5);
        assert_eq!(queue.total_count(), ids.len() as u64);
    }

    proptest! {
        #[test]
        fn claims_replay_added_ids_in_order(
            steps in prop::collection::vec((0u64..3, 1u64..20, 0usize..15), 1..40)
        ) {
            let mut queue = opened(0);
            let mut next = 1;
            let mut added = Vec::new();
            let mut claimed = Vec::new();
            for (gap, len, max) in steps {
                let run: Vec<UnstEthId> = (next + gap..next + gap + len).collect();
                next += gap + len;
                queue.add_unsteth_ids(&run).unwrap();
                added.extend(run);

                let batch = queue.claim_next_batch(max).unwrap();
                prop_assert!(batch.len() <= max);
                claimed.extend(batch);
                prop_assert!(claimed.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(&claimed[..], &added[..claimed.len()]);
                prop_assert!(queue.total_claimed() <= queue.total_count());
            }
            queue.close().unwrap();
            while !queue.is_all_batches_claimed() {
                claimed.extend(queue.claim_next_batch(7).unwrap());
            }
            prop_assert_eq!(claimed, added);
            prop_assert_eq!(queue.total_claimed(), queue.total_count());
        }
    }
}
