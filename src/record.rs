//! Data model shared by every component: partitions, sequence numbers and
//! records.

use bytes::Bytes;
use std::fmt;

/// Reserved, opaque sequence-number literal carried by the end-of-shard
/// sentinel record. Distinguished from any real sequence number the stream
/// service could emit.
pub const END_OF_SHARD: &str = "__END_OF_SHARD__";

/// `(stream_id, partition_id)`. Opaque, value-equal, immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamPartition {
    pub stream_id: String,
    pub partition_id: String,
}

impl StreamPartition {
    pub fn new(stream_id: impl Into<String>, partition_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            partition_id: partition_id.into(),
        }
    }
}

impl fmt::Display for StreamPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream_id, self.partition_id)
    }
}

/// Opaque, lexicographically comparable sequence number supplied by the
/// stream service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub String);

impl SequenceNumber {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn end_of_shard() -> Self {
        Self(END_OF_SHARD.to_string())
    }

    pub fn is_end_of_shard(&self) -> bool {
        self.0 == END_OF_SHARD
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(stream_id, partition_id, sequence_number, payloads)`.
///
/// `payloads` holds one or more decoded byte strings, or is empty for the
/// `END_OF_SHARD` sentinel.
#[derive(Debug, Clone)]
pub struct OrderedRecord {
    pub stream_id: String,
    pub partition_id: String,
    pub sequence_number: SequenceNumber,
    pub payloads: Vec<Bytes>,
}

impl OrderedRecord {
    pub fn new(
        partition: &StreamPartition,
        sequence_number: SequenceNumber,
        payloads: Vec<Bytes>,
    ) -> Self {
        Self {
            stream_id: partition.stream_id.clone(),
            partition_id: partition.partition_id.clone(),
            sequence_number,
            payloads,
        }
    }

    /// Builds the `END_OF_SHARD` sentinel for `partition`: empty payloads,
    /// the reserved sequence-number literal.
    pub fn end_of_shard(partition: &StreamPartition) -> Self {
        Self {
            stream_id: partition.stream_id.clone(),
            partition_id: partition.partition_id.clone(),
            sequence_number: SequenceNumber::end_of_shard(),
            payloads: Vec::new(),
        }
    }

    pub fn is_end_of_shard(&self) -> bool {
        self.sequence_number.is_end_of_shard()
    }

    pub fn partition(&self) -> StreamPartition {
        StreamPartition::new(self.stream_id.clone(), self.partition_id.clone())
    }
}
