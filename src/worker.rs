//! Partition Worker — one per assigned partition. Owns a cursor,
//! fetches, decodes, enqueues, handles retries, emits the end-of-shard
//! marker.

use crate::buffer::{BoundedRecordBuffer, OfferOutcome};
use crate::client::{ShardIteratorType, StreamClient};
use crate::config::{SupplierConfig, EXCEPTION_RETRY_DELAY, THROTTLE_BACKOFF};
use crate::decoder::Decoder;
use crate::error::ServiceError;
use crate::metrics::SupplierMetrics;
use crate::record::{OrderedRecord, SequenceNumber, StreamPartition};
use crate::scheduler::Scheduler;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// State shared by every partition worker and by the façade: the stream
/// client port, the decoder, and the currently-installed buffer/scheduler
/// generation. Held behind `ArcSwap` so the reseek protocol can replace
/// either atomically.
pub struct WorkerShared {
    pub stream_id: String,
    pub client: Arc<dyn StreamClient>,
    pub decoder: Arc<dyn Decoder>,
    pub buffer: ArcSwap<BoundedRecordBuffer>,
    pub scheduler: ArcSwap<Scheduler>,
    pub metrics: Arc<SupplierMetrics>,
    pub config: SupplierConfig,
}

/// Per-partition mutable state.
pub struct PartitionResource {
    pub partition: StreamPartition,
    cursor: Mutex<Option<String>>,
    last_sequence: Mutex<Option<SequenceNumber>>,
    started: AtomicBool,
    stop_requested: AtomicBool,
    /// Set once this worker has delivered its `END_OF_SHARD` sentinel.
    /// Distinct from `started`: both are false once a worker goes idle after
    /// emitting end-of-shard, but only this one must block the façade's
    /// one-shot rearm flag from re-triggering a second sentinel delivery for
    /// a partition nothing has reseeked. Cleared on `seek*` (§3: seek
    /// performs "cursor reset + worker reset").
    exhausted: AtomicBool,
    /// Set once a tick observes a fatal upstream error; the worker will not
    /// rearm. Exposed for observability only — a fatal failure is not
    /// surfaced to `poll` callers. Cleared on `seek*`, same as `exhausted`.
    failed: Mutex<Option<ServiceError>>,
}

impl PartitionResource {
    pub fn new(partition: StreamPartition) -> Self {
        Self {
            partition,
            cursor: Mutex::new(None),
            last_sequence: Mutex::new(None),
            started: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
            failed: Mutex::new(None),
        }
    }

    pub fn cursor(&self) -> Option<String> {
        self.cursor.lock().expect("cursor mutex poisoned").clone()
    }

    pub fn set_cursor(&self, cursor: Option<String>) {
        *self.cursor.lock().expect("cursor mutex poisoned") = cursor;
    }

    pub fn last_sequence(&self) -> Option<SequenceNumber> {
        self.last_sequence
            .lock()
            .expect("last_sequence mutex poisoned")
            .clone()
    }

    pub fn set_last_sequence(&self, seq: SequenceNumber) {
        *self.last_sequence.lock().expect("last_sequence mutex poisoned") = Some(seq);
    }

    pub fn clear_last_sequence(&self) {
        *self.last_sequence.lock().expect("last_sequence mutex poisoned") = None;
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn failure(&self) -> Option<ServiceError> {
        self.failed.lock().expect("failed mutex poisoned").clone()
    }

    fn mark_failed(&self, err: ServiceError) {
        *self.failed.lock().expect("failed mutex poisoned") = Some(err);
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    fn mark_exhausted(&self) {
        self.exhausted.store(true, Ordering::Release);
    }

    /// Clears terminal state (`exhausted`, `failed`) so a reseeked partition
    /// is eligible to be rearmed again.
    pub fn reset_terminal_state(&self) {
        self.exhausted.store(false, Ordering::Release);
        *self.failed.lock().expect("failed mutex poisoned") = None;
    }
}

/// Schedules the next tick for `resource` after `delay`, unless stopped or
/// the scheduler has already begun shutting down (rearm is then a benign
/// no-op).
fn rearm(shared: Arc<WorkerShared>, resource: Arc<PartitionResource>, delay: Duration) {
    if resource.is_stop_requested() {
        resource.set_started(false);
        return;
    }
    let scheduler = shared.scheduler.load_full();
    let shared_for_tick = shared.clone();
    let resource_for_tick = resource.clone();
    let result = scheduler.schedule(delay, move || async move {
        run_tick(shared_for_tick, resource_for_tick).await;
    });
    if result.is_err() {
        debug!(
            partition = %resource.partition,
            "rearm rejected, scheduler is shutting down"
        );
        resource.set_started(false);
    }
}

/// Runs one tick of the state machine.
pub async fn run_tick(shared: Arc<WorkerShared>, resource: Arc<PartitionResource>) {
    if resource.is_stop_requested() {
        resource.set_started(false);
        return;
    }

    let cursor = resource.cursor();
    let Some(cursor) = cursor else {
        emit_end_of_shard(shared, resource).await;
        return;
    };

    let buffer = shared.buffer.load_full();
    let t0 = Instant::now();
    let fetch_result = shared
        .client
        .get_records(&cursor, shared.config.records_per_fetch)
        .await;
    shared
        .metrics
        .observe_fetch_latency(t0.elapsed().as_secs_f64());

    match fetch_result {
        Ok(result) => handle_batch(shared, resource, buffer, result).await,
        Err(ServiceError::Throttled) => {
            shared.metrics.inc_throttled();
            let delay = THROTTLE_BACKOFF.max(shared.config.fetch_delay());
            rearm(shared, resource, delay);
        }
        Err(ServiceError::IteratorExpired) => handle_expired_iterator(shared, resource).await,
        Err(e @ ServiceError::NotFound(_)) | Err(e @ ServiceError::InvalidArgument(_)) => {
            fail_worker(shared, resource, e);
        }
        Err(ServiceError::RecoverableTransport(msg)) => {
            warn!(partition = %resource.partition, error = %msg, "recoverable transport error, retrying");
            rearm(shared, resource, EXCEPTION_RETRY_DELAY);
        }
        Err(e @ ServiceError::Unrecoverable(_)) => {
            fail_worker(shared, resource, e);
        }
    }
}

async fn emit_end_of_shard(shared: Arc<WorkerShared>, resource: Arc<PartitionResource>) {
    let buffer = shared.buffer.load_full();
    let sentinel = OrderedRecord::end_of_shard(&resource.partition);
    match buffer.offer(sentinel, shared.config.offer_timeout()).await {
        OfferOutcome::Accepted => {
            shared.metrics.inc_end_of_shard();
            resource.mark_exhausted();
            resource.set_started(false);
        }
        OfferOutcome::TimedOut => {
            rearm(shared, resource, shared.config.buffer_full_wait());
        }
    }
}

async fn handle_batch(
    shared: Arc<WorkerShared>,
    resource: Arc<PartitionResource>,
    buffer: Arc<BoundedRecordBuffer>,
    result: crate::client::GetRecordsResult,
) {
    let mut stalled_at: Option<String> = None;

    for raw in &result.records {
        let payloads = shared.decoder.decode(raw);
        let seq = SequenceNumber::new(raw.sequence_number.clone());
        let record = OrderedRecord::new(&resource.partition, seq.clone(), payloads);

        match buffer.offer(record, shared.config.offer_timeout()).await {
            OfferOutcome::Accepted => {
                resource.set_last_sequence(seq);
            }
            OfferOutcome::TimedOut => {
                shared.metrics.inc_offer_timeout();
                stalled_at = Some(raw.sequence_number.clone());
                break;
            }
        }
    }

    match stalled_at {
        Some(seq) => {
            // Backpressure non-loss: re-request a cursor
            // rooted exactly at the record we failed to enqueue, so the
            // next tick re-fetches starting there instead of skipping it.
            let new_cursor = shared
                .client
                .get_shard_iterator(
                    &shared.stream_id,
                    &resource.partition.partition_id,
                    ShardIteratorType::AtSequenceNumber,
                    Some(seq.as_str()),
                )
                .await;
            match new_cursor {
                Ok(cursor) => resource.set_cursor(Some(cursor)),
                Err(e) => {
                    warn!(
                        partition = %resource.partition,
                        error = %e,
                        "failed to re-root cursor after buffer-full; retrying from previous cursor"
                    );
                }
            }
            rearm(shared, resource, shared.config.buffer_full_wait());
        }
        None => {
            resource.set_cursor(result.next_iterator);
            rearm(shared, resource, shared.config.fetch_delay());
        }
    }
}

async fn handle_expired_iterator(shared: Arc<WorkerShared>, resource: Arc<PartitionResource>) {
    let Some(last) = resource.last_sequence() else {
        fail_worker(
            shared,
            resource,
            ServiceError::Unrecoverable("iterator expired with no recoverable position".into()),
        );
        return;
    };

    let new_cursor = shared
        .client
        .get_shard_iterator(
            &shared.stream_id,
            &resource.partition.partition_id,
            ShardIteratorType::AfterSequenceNumber,
            Some(last.as_str()),
        )
        .await;

    match new_cursor {
        Ok(cursor) => {
            resource.set_cursor(Some(cursor));
            rearm(shared, resource, shared.config.fetch_delay());
        }
        Err(e) => fail_worker(shared, resource, e),
    }
}

fn fail_worker(shared: Arc<WorkerShared>, resource: Arc<PartitionResource>, err: ServiceError) {
    error!(partition = %resource.partition, error = %err, "partition worker failed, stopping");
    shared.metrics.inc_worker_failure();
    resource.mark_failed(err);
    resource.set_started(false);
}
