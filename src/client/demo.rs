//! An in-memory, deterministic [`StreamClient`] used by the example binary
//! and the scenario tests.
//!
//! Credential acquisition, endpoint/region parsing and real stream discovery
//! are out of scope for this crate; this stands in for them so it is
//! runnable end to end without a live stream service, the same way a
//! scriptable test hook lets a reconnect loop run deterministically without
//! a live exchange connection.
//!
//! Each partition is scripted as a fixed record list plus optional one-shot
//! error traps keyed by iterator position, so `AT_SEQUENCE_NUMBER` /
//! `AFTER_SEQUENCE_NUMBER` seeks behave like a real shard: requesting a
//! cursor at a given sequence number actually replays from that position.

use super::{GetRecordsResult, RawRecord, ShardIteratorType, StreamClient};
use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A one-shot fault injected at a given iterator position; consumed the
/// first time `get_records` is called with that exact position.
#[derive(Debug, Clone, Copy)]
pub enum Trap {
    Throttled,
    IteratorExpired,
    NotFound,
    InvalidArgument,
    RecoverableTransport,
    Unrecoverable,
}

struct ShardScript {
    records: Vec<&'static str>,
    closed: bool,
    traps: HashMap<usize, Trap>,
}

/// Deterministic, script-driven [`StreamClient`] for tests and the demo
/// binary. Iterators are plain strings of the form `"<partition>#<position>"`,
/// where `position` indexes into the partition's scripted record list.
pub struct DemoStreamClient {
    partitions: HashSet<String>,
    shards: Mutex<HashMap<String, ShardScript>>,
}

impl DemoStreamClient {
    pub fn new(partitions: impl IntoIterator<Item = String>) -> Self {
        Self {
            partitions: partitions.into_iter().collect(),
            shards: Mutex::new(HashMap::new()),
        }
    }

    /// Scripts a partition's full, fixed record list. `closed` controls
    /// whether `get_records` reports `next_iterator = None` once the last
    /// record has been returned. `traps` inject a one-shot error the first
    /// time `get_records` is called with the iterator sitting at that
    /// position (position 0 = before the first record).
    pub fn script(
        &self,
        partition: &str,
        records: Vec<&'static str>,
        closed: bool,
        traps: Vec<(usize, Trap)>,
    ) {
        self.shards.lock().expect("demo client mutex poisoned").insert(
            partition.to_string(),
            ShardScript {
                records,
                closed,
                traps: traps.into_iter().collect(),
            },
        );
    }

    fn iterator_for(partition: &str, position: usize) -> String {
        format!("{partition}#{position}")
    }

    fn parse_iterator(iterator: &str) -> Option<(&str, usize)> {
        let (partition, position) = iterator.rsplit_once('#')?;
        let position: usize = position.parse().ok()?;
        Some((partition, position))
    }
}

#[async_trait]
impl StreamClient for DemoStreamClient {
    async fn get_shard_iterator(
        &self,
        _stream: &str,
        partition: &str,
        iterator_type: ShardIteratorType,
        sequence_number: Option<&str>,
    ) -> Result<String, ServiceError> {
        if iterator_type.requires_sequence() && sequence_number.is_none() {
            return Err(ServiceError::InvalidArgument(
                "sequence_number required for AT/AFTER_SEQUENCE_NUMBER".into(),
            ));
        }
        if !self.partitions.contains(partition) {
            return Err(ServiceError::NotFound(partition.to_string()));
        }

        let shards = self.shards.lock().expect("demo client mutex poisoned");
        let shard = shards
            .get(partition)
            .ok_or_else(|| ServiceError::NotFound(partition.to_string()))?;

        let position = match iterator_type {
            ShardIteratorType::TrimHorizon => 0,
            ShardIteratorType::Latest => shard.records.len(),
            ShardIteratorType::AtSequenceNumber => {
                let seq = sequence_number.expect("checked above");
                shard
                    .records
                    .iter()
                    .position(|r| *r == seq)
                    .ok_or_else(|| ServiceError::NotFound(format!("sequence {seq}")))?
            }
            ShardIteratorType::AfterSequenceNumber => {
                let seq = sequence_number.expect("checked above");
                let idx = shard
                    .records
                    .iter()
                    .position(|r| *r == seq)
                    .ok_or_else(|| ServiceError::NotFound(format!("sequence {seq}")))?;
                idx + 1
            }
        };

        Ok(Self::iterator_for(partition, position))
    }

    async fn get_records(
        &self,
        iterator: &str,
        limit: u32,
    ) -> Result<GetRecordsResult, ServiceError> {
        let (partition, position) = Self::parse_iterator(iterator)
            .ok_or_else(|| ServiceError::InvalidArgument(format!("bad iterator: {iterator}")))?;

        let mut shards = self.shards.lock().expect("demo client mutex poisoned");
        let shard = shards
            .get_mut(partition)
            .ok_or_else(|| ServiceError::NotFound(partition.to_string()))?;

        if let Some(trap) = shard.traps.remove(&position) {
            return Err(match trap {
                Trap::Throttled => ServiceError::Throttled,
                Trap::IteratorExpired => ServiceError::IteratorExpired,
                Trap::NotFound => ServiceError::NotFound(partition.to_string()),
                Trap::InvalidArgument => ServiceError::InvalidArgument(partition.to_string()),
                Trap::RecoverableTransport => {
                    ServiceError::RecoverableTransport("demo transport blip".into())
                }
                Trap::Unrecoverable => ServiceError::Unrecoverable("demo fatal fault".into()),
            });
        }

        let end = (position + limit as usize).min(shard.records.len());
        let records = if position < end {
            shard.records[position..end]
                .iter()
                .map(|s| RawRecord {
                    sequence_number: s.to_string(),
                    data: bytes::Bytes::from_static(s.as_bytes()),
                })
                .collect()
        } else {
            Vec::new()
        };

        let reached_end = end >= shard.records.len();
        let next_iterator = if reached_end && shard.closed {
            None
        } else {
            Some(Self::iterator_for(partition, end))
        };

        Ok(GetRecordsResult {
            records,
            next_iterator,
        })
    }

    async fn list_partitions(&self, _stream: &str) -> Result<HashSet<String>, ServiceError> {
        Ok(self.partitions.clone())
    }
}
