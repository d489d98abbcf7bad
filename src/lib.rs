//! A Kinesis-style multi-partition record supplier: assign partitions, start
//! fetching, poll a single ordered stream of records per partition, seek, and
//! discover earliest/latest positions — all independent of any one
//! partition's upstream iterator quirks.

pub mod buffer;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod facade;
pub mod metrics;
pub mod probe;
pub mod prometheus;
pub mod record;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod tests;

pub use client::{GetRecordsResult, RawRecord, ShardIteratorType, StreamClient};
pub use config::{AppConfig, SupplierConfig};
pub use decoder::{Decoder, IdentityDecoder};
pub use error::{AppError, AppResult, ServiceError};
pub use facade::SupplierFacade;
pub use record::{OrderedRecord, SequenceNumber, StreamPartition};
