//! DestinationClient trait - one downstream endpoint
//!
//! Defines the abstract interface for forwarding transports.

use arrow_array::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::ContractError;

/// URI schemes a destination may use: plain HTTP, HTTPS and Flight
pub const SUPPORTED_SCHEMES: [&str; 3] = ["http", "https", "rpc"];

/// Write representation a client can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Flat encoded write buffer (line protocol)
    EncodedPayload,
    /// Columnar record batch tagged with a measurement
    ColumnarBatch,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodedPayload => f.write_str("encoded payload"),
            Self::ColumnarBatch => f.write_str("columnar batch"),
        }
    }
}

/// Transport to one subscription destination
///
/// Every client supports exactly one [`Capability`]; calling the other
/// send method returns `ContractError::CapabilityMismatch`.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Forward an encoded payload for `db`/`rp`
    ///
    /// # Errors
    /// Capability mismatch, transport failure or non-success status
    async fn send(&self, db: &str, rp: &str, payload: Bytes) -> Result<(), ContractError>;

    /// Forward a columnar record of measurement `mst`
    ///
    /// # Errors
    /// Capability mismatch or stream failure
    async fn send_column(
        &self,
        db: &str,
        rp: &str,
        mst: &str,
        record: &RecordBatch,
    ) -> Result<(), ContractError>;

    /// Destination address (used for logging)
    fn destination(&self) -> &str;

    /// Which representation this client accepts
    fn capability(&self) -> Capability;
}
