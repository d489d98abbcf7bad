//! Decoder Interface — optional pluggable expansion of one raw stream record
//! into one or more payloads (e.g. de-aggregation of KPL-aggregated
//! records). Default is identity.

use crate::client::RawRecord;
use bytes::Bytes;

/// Turns one raw stream record into one or more decoded payloads.
pub trait Decoder: Send + Sync {
    fn decode(&self, raw: &RawRecord) -> Vec<Bytes>;
}

/// Default decoder: each raw record maps to exactly its own bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityDecoder;

impl Decoder for IdentityDecoder {
    fn decode(&self, raw: &RawRecord) -> Vec<Bytes> {
        vec![raw.data.clone()]
    }
}
