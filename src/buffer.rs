//! Bounded Record Buffer — a fixed-capacity FIFO shared across all
//! partitions. Many writers (one per partition worker), a single reader (the
//! façade's `poll`).
//!
//! Capacity is enforced with a pair of counting semaphores rather than a
//! polled loop: `free_slots` represents unused capacity and is acquired
//! before a push, `items_ready` represents queued items and is acquired
//! before a pop. This gives `offer`/`drain` their async-blocking-with-timeout
//! semantics for free, the same way in-flight database batches elsewhere in
//! this codebase are bounded with a `tokio::sync::Semaphore`.

use crate::record::{OrderedRecord, StreamPartition};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    TimedOut,
}

pub struct BoundedRecordBuffer {
    capacity: usize,
    queue: Mutex<VecDeque<OrderedRecord>>,
    free_slots: Semaphore,
    items_ready: Semaphore,
}

impl BoundedRecordBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer_size must be > 0");
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            free_slots: Semaphore::new(capacity),
            items_ready: Semaphore::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of buffered records. For tests/observability only;
    /// never exceeds `capacity`.
    pub fn len(&self) -> usize {
        self.queue.lock().expect("buffer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks up to `timeout` for a free slot, then pushes `record`.
    pub async fn offer(&self, record: OrderedRecord, timeout: Duration) -> OfferOutcome {
        let permit = match tokio::time::timeout(timeout, self.free_slots.acquire()).await {
            Ok(Ok(permit)) => permit,
            _ => return OfferOutcome::TimedOut,
        };
        permit.forget();
        self.queue
            .lock()
            .expect("buffer mutex poisoned")
            .push_back(record);
        self.items_ready.add_permits(1);
        OfferOutcome::Accepted
    }

    /// Removes up to `max` records: waits up to `timeout` for the first one
    /// to become available, then drains any further ones already queued
    /// without blocking.
    pub async fn drain(&self, max: usize, timeout: Duration) -> Vec<OrderedRecord> {
        let mut out = Vec::new();
        if max == 0 {
            return out;
        }

        let first = match tokio::time::timeout(timeout, self.items_ready.acquire()).await {
            Ok(Ok(permit)) => permit,
            _ => return out,
        };
        first.forget();
        out.push(self.pop_one());

        while out.len() < max {
            match self.items_ready.try_acquire() {
                Ok(permit) => {
                    permit.forget();
                    out.push(self.pop_one());
                }
                Err(_) => break,
            }
        }
        out
    }

    /// Drains every currently-queued record without blocking (used by the
    /// reseek protocol to rebuild the buffer).
    pub fn drain_all_nonblocking(&self) -> Vec<OrderedRecord> {
        let mut out = Vec::new();
        loop {
            match self.items_ready.try_acquire() {
                Ok(permit) => {
                    permit.forget();
                    out.push(self.pop_one());
                }
                Err(_) => break,
            }
        }
        out
    }

    fn pop_one(&self) -> OrderedRecord {
        let record = self
            .queue
            .lock()
            .expect("buffer mutex poisoned")
            .pop_front()
            .expect("items_ready permit implies a queued record");
        self.free_slots.add_permits(1);
        record
    }

    /// Builds a fresh buffer of the same capacity containing, in order,
    /// every record from `self` whose partition is not in `excluded`. Used
    /// by the reseek protocol: records from partitions being reseeked are
    /// discarded, the rest are preserved.
    pub fn rebuild_excluding(&self, excluded: &[StreamPartition]) -> Self {
        let fresh = Self::new(self.capacity);
        for record in self.drain_all_nonblocking() {
            if !excluded.iter().any(|p| {
                p.stream_id == record.stream_id && p.partition_id == record.partition_id
            }) {
                // Capacity can't be exceeded: we drained at most `capacity`
                // records from `self` and discard some of them here.
                let _ = fresh
                    .free_slots
                    .try_acquire()
                    .expect("rebuilt buffer has spare capacity for preserved records");
                fresh
                    .queue
                    .lock()
                    .expect("buffer mutex poisoned")
                    .push_back(record);
                fresh.items_ready.add_permits(1);
            }
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StreamPartition;

    fn record(seq: &str) -> OrderedRecord {
        let partition = StreamPartition::new("s", "p");
        OrderedRecord::new(&partition, crate::record::SequenceNumber::new(seq), Vec::new())
    }

    #[tokio::test]
    async fn offer_blocks_once_capacity_is_reached() {
        let buffer = BoundedRecordBuffer::new(1);
        assert_eq!(
            buffer.offer(record("1"), Duration::from_millis(50)).await,
            OfferOutcome::Accepted
        );
        assert_eq!(
            buffer.offer(record("2"), Duration::from_millis(20)).await,
            OfferOutcome::TimedOut
        );
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn drain_preserves_enqueue_order() {
        let buffer = BoundedRecordBuffer::new(4);
        for seq in ["1", "2", "3"] {
            buffer.offer(record(seq), Duration::from_millis(50)).await;
        }
        let drained = buffer.drain(10, Duration::from_millis(50)).await;
        let got: Vec<String> = drained.iter().map(|r| r.sequence_number.to_string()).collect();
        assert_eq!(got, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn rebuild_excluding_drops_only_scoped_partitions() {
        let buffer = BoundedRecordBuffer::new(4);
        let a = StreamPartition::new("s", "a");
        let b = StreamPartition::new("s", "b");
        buffer
            .offer(
                OrderedRecord::new(&a, crate::record::SequenceNumber::new("1"), Vec::new()),
                Duration::from_millis(50),
            )
            .await;
        buffer
            .offer(
                OrderedRecord::new(&b, crate::record::SequenceNumber::new("1"), Vec::new()),
                Duration::from_millis(50),
            )
            .await;

        let rebuilt = buffer.rebuild_excluding(&[a]);
        let remaining = rebuilt.drain_all_nonblocking();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].partition_id, "b");
    }
}
