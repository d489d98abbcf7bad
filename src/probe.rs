//! Probe Protocol — time-bounded discovery of the earliest or latest
//! sequence number visible on a partition, used by `getEarliestSequenceNumber`
//! / `getLatestSequenceNumber` without disturbing any assigned worker's
//! cursor.

use crate::client::{GetRecordsResult, ShardIteratorType, StreamClient};
use crate::config::THROTTLE_BACKOFF;
use crate::error::ServiceError;
use crate::record::SequenceNumber;
use std::time::Duration;
use tokio::time::Instant;

/// Resolves the first sequence number visible from `iterator_type` (normally
/// `TrimHorizon` or `Latest`) within `probe_timeout`.
///
/// Returns:
/// - `Ok(Some(seq))` — a real record was found.
/// - `Ok(Some(SequenceNumber::end_of_shard()))` — the shard is closed and
///   empty from this position.
/// - `Ok(None)` — `probe_timeout` elapsed before either was determined.
pub async fn probe(
    client: &dyn StreamClient,
    stream: &str,
    partition: &str,
    iterator_type: ShardIteratorType,
    probe_timeout: Duration,
) -> Result<Option<SequenceNumber>, ServiceError> {
    let mut iterator = match client
        .get_shard_iterator(stream, partition, iterator_type, None)
        .await
    {
        Ok(it) => Some(it),
        // A partition that does not (yet) exist is treated as closed/empty
        // from this starting position, not as a transport failure.
        Err(ServiceError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let deadline = Instant::now() + probe_timeout;

    while let Some(it) = iterator {
        if Instant::now() >= deadline {
            return Ok(None);
        }

        match client.get_records(&it, 1000).await {
            Ok(GetRecordsResult {
                records,
                next_iterator,
            }) => {
                if let Some(first) = records.first() {
                    return Ok(Some(SequenceNumber::new(first.sequence_number.clone())));
                }
                iterator = next_iterator;
            }
            Err(ServiceError::Throttled) => {
                tokio::time::sleep(THROTTLE_BACKOFF).await;
                iterator = Some(it);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Some(SequenceNumber::end_of_shard()))
}
