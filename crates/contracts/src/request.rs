//! WriteRequest - unit of forwarding work
//!
//! Created per write, consumed by exactly one worker, never retried.

use arrow_array::RecordBatch;
use bytes::Bytes;

/// Write representation carried by a request
#[derive(Debug, Clone)]
pub enum Payload {
    /// Encoded write buffer
    Encoded(Bytes),
    /// Columnar record with its measurement name
    Columnar { mst: String, record: RecordBatch },
}

/// A payload addressed to one client of a writer
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Index into the writer's client list
    pub client: usize,
    pub payload: Payload,
}

impl WriteRequest {
    pub fn encoded(client: usize, payload: Bytes) -> Self {
        Self {
            client,
            payload: Payload::Encoded(payload),
        }
    }

    pub fn columnar(client: usize, mst: impl Into<String>, record: RecordBatch) -> Self {
        Self {
            client,
            payload: Payload::Columnar {
                mst: mst.into(),
                record,
            },
        }
    }
}
