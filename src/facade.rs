//! Supplier Façade — the public surface: assignment, start, seek,
//! poll, discovery and close. Owns the scheduler/buffer generation and runs
//! the reseek protocol.

use crate::buffer::BoundedRecordBuffer;
use crate::client::{ShardIteratorType, StreamClient};
use crate::config::{SupplierConfig, EXCEPTION_RETRY_DELAY};
use crate::decoder::{Decoder, IdentityDecoder};
use crate::error::{AppError, AppResult};
use crate::metrics::SupplierMetrics;
use crate::probe;
use crate::record::{OrderedRecord, SequenceNumber, StreamPartition};
use crate::scheduler::Scheduler;
use crate::worker::{self, PartitionResource, WorkerShared};
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// The supplier: one instance per stream, shared by every caller thread via
/// `Arc`. All state mutation goes through interior mutability so `poll`,
/// `seek*` and `assign` can be called from independent tasks.
pub struct SupplierFacade {
    shared: Arc<WorkerShared>,
    assignment: RwLock<HashMap<StreamPartition, Arc<PartitionResource>>>,
    /// One-shot flag: set whenever assignment or a reseek leaves workers
    /// unarmed, cleared the next time `start` or `poll` arms them.
    check_partitions_started: AtomicBool,
    closed: AtomicBool,
}

impl SupplierFacade {
    pub fn new(
        stream_id: impl Into<String>,
        client: Arc<dyn StreamClient>,
        decoder: Option<Arc<dyn Decoder>>,
        config: SupplierConfig,
        metrics: Arc<SupplierMetrics>,
    ) -> AppResult<Self> {
        let decoder = if config.decoder_enabled {
            decoder.ok_or(AppError::DecoderUnavailable)?
        } else {
            Arc::new(IdentityDecoder) as Arc<dyn Decoder>
        };

        let scheduler = Scheduler::new(config.fetch_threads);
        let buffer = BoundedRecordBuffer::new(config.buffer_size);

        let shared = Arc::new(WorkerShared {
            stream_id: stream_id.into(),
            client,
            decoder,
            buffer: ArcSwap::from_pointee(buffer),
            scheduler: ArcSwap::from_pointee(scheduler),
            metrics,
            config,
        });

        Ok(Self {
            shared,
            assignment: RwLock::new(HashMap::new()),
            check_partitions_started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(AppError::Closed)
        } else {
            Ok(())
        }
    }

    /// Installs the set of partitions this supplier should fetch from.
    /// Newly added partitions get a fresh, un-started resource; removed ones
    /// are told to stop and dropped from the map (their scheduled tick, if
    /// any, runs to completion once more and then does not rearm). Does not
    /// itself start fetching.
    pub fn assign(&self, partitions: HashSet<StreamPartition>) -> AppResult<()> {
        self.ensure_open()?;
        let mut assignment = self.assignment.write().expect("assignment lock poisoned");

        for p in &partitions {
            assignment
                .entry(p.clone())
                .or_insert_with(|| Arc::new(PartitionResource::new(p.clone())));
        }

        let to_remove: Vec<StreamPartition> = assignment
            .keys()
            .filter(|p| !partitions.contains(p))
            .cloned()
            .collect();
        for p in to_remove {
            if let Some(resource) = assignment.remove(&p) {
                resource.request_stop();
            }
        }
        drop(assignment);

        // A newly-added partition's worker must not start until `start` or
        // the next `poll` (spec.md §4.F); setting the one-shot flag here is
        // what makes that happen even in steady state, when a prior
        // `start`/`poll` has already consumed it.
        self.check_partitions_started.store(true, Ordering::Release);

        Ok(())
    }

    /// Arms every idle, non-terminal assigned worker once the one-shot flag
    /// is set, otherwise a no-op. Called by both `start` and `poll`.
    ///
    /// Skips workers that are already started (re-arming those would
    /// violate "at most one scheduled tick in flight per partition") and
    /// workers that reached a terminal state since their last seek —
    /// exhausted (already delivered `END_OF_SHARD`) or failed — since
    /// re-arming either would re-run a tick that has nothing left to do but
    /// redeliver a sentinel or immediately re-fail. This is what makes it
    /// safe for `assign` to set the flag unconditionally to pick up a newly
    /// added partition: any other, already-finished partition sitting in
    /// the assignment is left alone.
    fn arm_if_needed(&self) {
        if self
            .check_partitions_started
            .swap(false, Ordering::AcqRel)
        {
            let assignment = self.assignment.read().expect("assignment lock poisoned");
            for resource in assignment.values() {
                if !resource.is_started() && !resource.is_exhausted() && resource.failure().is_none() {
                    self.arm_worker(resource.clone());
                }
            }
        }
    }

    fn arm_worker(&self, resource: Arc<PartitionResource>) {
        resource.set_started(true);
        let shared = self.shared.clone();
        let scheduler = self.shared.scheduler.load_full();
        let _ = scheduler.schedule(Duration::ZERO, move || async move {
            worker::run_tick(shared, resource).await;
        });
    }

    /// Begins fetching for every currently-assigned partition that is not
    /// already running.
    pub async fn start(&self) -> AppResult<()> {
        self.ensure_open()?;
        self.arm_if_needed();
        Ok(())
    }

    /// Removes up to `max_records_per_poll` records from the shared buffer,
    /// filtering out anything belonging to a partition that is no longer
    /// assigned: reassignment races are resolved by silently dropping,
    /// rather than re-delivering, stale output.
    pub async fn poll(&self, timeout: Duration) -> AppResult<Vec<OrderedRecord>> {
        self.ensure_open()?;
        self.arm_if_needed();

        let buffer = self.shared.buffer.load_full();
        let drained = buffer.drain(self.shared.config.max_records_per_poll, timeout).await;

        let assignment = self.assignment.read().expect("assignment lock poisoned");
        let filtered: Vec<OrderedRecord> = drained
            .into_iter()
            .filter(|r| assignment.contains_key(&r.partition()))
            .collect();
        drop(assignment);

        self.shared
            .metrics
            .add_records_delivered(filtered.len() as u64);
        self.shared.metrics.set_buffer_depth(buffer.len() as i64);

        Ok(filtered)
    }

    /// Repoints one partition's cursor at an explicit sequence number.
    pub async fn seek(&self, partition: &StreamPartition, sequence: SequenceNumber) -> AppResult<()> {
        self.reseek(
            std::slice::from_ref(partition),
            ShardIteratorType::AtSequenceNumber,
            |_| Some(sequence.as_str().to_string()),
        )
        .await
    }

    /// Repoints every partition in `partitions` at the oldest retained record.
    pub async fn seek_to_earliest(&self, partitions: &[StreamPartition]) -> AppResult<()> {
        self.reseek(partitions, ShardIteratorType::TrimHorizon, |_| None)
            .await
    }

    /// Repoints every partition in `partitions` at the newest record going
    /// forward.
    pub async fn seek_to_latest(&self, partitions: &[StreamPartition]) -> AppResult<()> {
        self.reseek(partitions, ShardIteratorType::Latest, |_| None)
            .await
    }

    /// The reseek protocol:
    /// 1. Shut the current scheduler down (bounded graceful wait, then
    ///    force) so no stale tick can enqueue a pre-seek record.
    /// 2. Install a fresh scheduler generation.
    /// 3. Rebuild the buffer, discarding queued records for partitions in
    ///    scope and preserving everything else.
    /// 4. Request a new cursor for each partition in scope and reset its
    ///    worker state; mark every assigned worker not-started so the next
    ///    `start`/`poll` rearms the whole assignment in one shot.
    async fn reseek<F>(
        &self,
        scope: &[StreamPartition],
        iterator_type: ShardIteratorType,
        mut sequence_for: F,
    ) -> AppResult<()>
    where
        F: FnMut(&StreamPartition) -> Option<String>,
    {
        self.ensure_open()?;

        let old_scheduler = self.shared.scheduler.load_full();
        old_scheduler.await_termination(EXCEPTION_RETRY_DELAY).await;
        self.shared
            .scheduler
            .store(Arc::new(Scheduler::new(self.shared.config.fetch_threads)));

        let old_buffer = self.shared.buffer.load_full();
        let new_buffer = old_buffer.rebuild_excluding(scope);
        self.shared.buffer.store(Arc::new(new_buffer));

        // Snapshot the resources in scope before any `.await`: a
        // `std::sync::RwLockReadGuard` held across an await point would make
        // this future non-Send, which would break callers that `tokio::spawn`
        // a seek.
        let scoped: Vec<Arc<PartitionResource>> = {
            let assignment = self.assignment.read().expect("assignment lock poisoned");
            scope
                .iter()
                .map(|partition| {
                    assignment
                        .get(partition)
                        .cloned()
                        .ok_or_else(|| AppError::NotAssigned(partition.to_string()))
                })
                .collect::<AppResult<_>>()?
        };

        for (partition, resource) in scope.iter().zip(&scoped) {
            let sequence = sequence_for(partition);
            let cursor = self
                .shared
                .client
                .get_shard_iterator(
                    &self.shared.stream_id,
                    &partition.partition_id,
                    iterator_type,
                    sequence.as_deref(),
                )
                .await?;
            resource.set_cursor(Some(cursor));
            resource.clear_last_sequence();
            resource.reset_terminal_state();
        }

        {
            let assignment = self.assignment.read().expect("assignment lock poisoned");
            for resource in assignment.values() {
                resource.set_started(false);
            }
        }

        self.check_partitions_started.store(true, Ordering::Release);
        self.shared.metrics.inc_reseek();
        Ok(())
    }

    /// Discovers the oldest retained sequence number on `partition` without
    /// touching any worker's cursor.
    pub async fn get_earliest_sequence_number(
        &self,
        partition: &StreamPartition,
    ) -> AppResult<Option<SequenceNumber>> {
        self.ensure_open()?;
        let seq = probe::probe(
            self.shared.client.as_ref(),
            &self.shared.stream_id,
            &partition.partition_id,
            ShardIteratorType::TrimHorizon,
            self.shared.config.probe_timeout(),
        )
        .await?;
        Ok(seq)
    }

    /// Discovers the newest sequence number going forward on `partition`
    /// without touching any worker's cursor.
    pub async fn get_latest_sequence_number(
        &self,
        partition: &StreamPartition,
    ) -> AppResult<Option<SequenceNumber>> {
        self.ensure_open()?;
        let seq = probe::probe(
            self.shared.client.as_ref(),
            &self.shared.stream_id,
            &partition.partition_id,
            ShardIteratorType::Latest,
            self.shared.config.probe_timeout(),
        )
        .await?;
        Ok(seq)
    }

    /// Delegates to the stream client's partition discovery.
    pub async fn get_partition_ids(&self) -> AppResult<HashSet<String>> {
        self.ensure_open()?;
        Ok(self.shared.client.list_partitions(&self.shared.stream_id).await?)
    }

    /// The currently assigned partitions.
    pub fn get_assignment(&self) -> HashSet<StreamPartition> {
        self.assignment
            .read()
            .expect("assignment lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Always fails: position tracking is the caller's responsibility.
    pub fn get_position(&self, _partition: &StreamPartition) -> AppResult<SequenceNumber> {
        Err(AppError::PositionUnsupported)
    }

    /// Stops every worker and shuts the scheduler down. Idempotent: closing
    /// an already-closed façade succeeds without effect.
    pub async fn close(&self) -> AppResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        {
            let mut assignment = self.assignment.write().expect("assignment lock poisoned");
            for resource in assignment.values() {
                resource.request_stop();
            }
            assignment.clear();
        }

        let scheduler = self.shared.scheduler.load_full();
        scheduler.await_termination(EXCEPTION_RETRY_DELAY).await;
        Ok(())
    }
}
