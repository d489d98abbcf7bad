//! Stream Client Interface — the thin abstract port the core uses to reach
//! the stream service. Credential acquisition, endpoint/region parsing and
//! stream discovery beyond `listPartitions` are left to implementors.

pub mod demo;

use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Positional intent used when requesting a shard iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardIteratorType {
    AtSequenceNumber,
    AfterSequenceNumber,
    TrimHorizon,
    Latest,
}

impl ShardIteratorType {
    /// Whether this iterator type requires an accompanying sequence number.
    pub fn requires_sequence(self) -> bool {
        matches!(
            self,
            ShardIteratorType::AtSequenceNumber | ShardIteratorType::AfterSequenceNumber
        )
    }
}

/// One raw record as returned by `getRecords`, prior to decoding.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub sequence_number: String,
    pub data: bytes::Bytes,
}

/// Result of one `getRecords` call.
///
/// `next_iterator` is `None` iff the shard is closed/split/merged. An empty
/// `records` list does not by itself imply closure.
#[derive(Debug, Clone, Default)]
pub struct GetRecordsResult {
    pub records: Vec<RawRecord>,
    pub next_iterator: Option<String>,
}

/// Thin abstract port onto the stream service (Kinesis-style).
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn get_shard_iterator(
        &self,
        stream: &str,
        partition: &str,
        iterator_type: ShardIteratorType,
        sequence_number: Option<&str>,
    ) -> Result<String, ServiceError>;

    async fn get_records(
        &self,
        iterator: &str,
        limit: u32,
    ) -> Result<GetRecordsResult, ServiceError>;

    async fn list_partitions(&self, stream: &str) -> Result<HashSet<String>, ServiceError>;
}
