//! FlightClient - columnar records over an Arrow Flight `DoPut` stream
//!
//! One authenticated upload stream is opened per client and kept for the
//! client's lifetime. Each record is encoded with its own descriptor
//! `{"db": .., "rp": .., "mst": ..}` and pushed onto that stream.

use arrow_flight::client::FlightClient as FlightServiceClient;
use arrow_flight::encode::FlightDataEncoderBuilder;
use arrow_flight::error::FlightError;
use arrow_flight::{FlightData, FlightDescriptor, PutResult};
use async_trait::async_trait;
use bytes::Bytes;
use contracts::{Capability, ContractError, DestinationClient, RecordBatch};
use std::time::Duration;
use futures::stream::BoxStream;
use futures::{stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Endpoint;
use tracing::{debug, error, instrument, warn};

/// Messages buffered between `send_column` and the gRPC stream
const UPLOAD_BUFFER: usize = 64;

/// Client for `rpc://host:port` destinations
pub struct FlightClient {
    address: String,
    token: String,
    /// Single-writer upload stream; the lock spans one whole record.
    /// Dropping the sender half-closes the `DoPut` call.
    upload: Mutex<mpsc::Sender<FlightData>>,
}

impl FlightClient {
    /// Connect, authenticate with `credential` and open the upload stream
    ///
    /// Connecting and the handshake together must finish within `timeout`.
    ///
    /// # Errors
    /// Invalid address, connection failure, timeout or rejected handshake
    #[instrument(name = "flight_client_connect", skip(credential))]
    pub async fn connect(
        address: &str,
        credential: &str,
        timeout: Duration,
    ) -> Result<Self, ContractError> {
        let endpoint = Endpoint::from_shared(format!("http://{address}"))
            .map_err(|e| ContractError::invalid_destination(address, e.to_string()))?
            .connect_timeout(timeout);

        let authenticated = authenticate(address, endpoint, credential);
        let (client, token) = tokio::time::timeout(timeout, authenticated)
            .await
            .map_err(|_| {
                ContractError::transport(address, format!("no answer within {timeout:?}"))
            })??;

        let (tx, rx) = mpsc::channel(UPLOAD_BUFFER);
        tokio::spawn(run_upload(address.to_string(), client, rx));

        debug!(dest = %address, "FlightClient authenticated");

        Ok(Self {
            address: address.to_string(),
            token,
            upload: Mutex::new(tx),
        })
    }

    /// Token returned by the handshake
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Descriptor path tagging one record
pub fn descriptor_path(db: &str, rp: &str, mst: &str) -> String {
    format!(
        r#"{{"db": {}, "rp": {}, "mst": {}}}"#,
        serde_json::Value::from(db),
        serde_json::Value::from(rp),
        serde_json::Value::from(mst)
    )
}

/// Open the channel and trade the credential for a bearer token
async fn authenticate(
    address: &str,
    endpoint: Endpoint,
    credential: &str,
) -> Result<(FlightServiceClient, String), ContractError> {
    let channel = endpoint
        .connect()
        .await
        .map_err(|e| ContractError::transport(address, e.to_string()))?;

    let mut client = FlightServiceClient::new(channel);
    let token = client
        .handshake(Bytes::copy_from_slice(credential.as_bytes()))
        .await
        .map_err(|e| ContractError::handshake(address, e.to_string()))?;
    let token = String::from_utf8(token.to_vec())
        .map_err(|e| ContractError::handshake(address, format!("token is not utf-8: {e}")))?;
    client
        .add_header("authorization", &format!("Bearer {token}"))
        .map_err(|e| ContractError::handshake(address, e.to_string()))?;
    Ok((client, token))
}

/// Drive the `DoPut` call for the lifetime of the client
async fn run_upload(address: String, mut client: FlightServiceClient, rx: mpsc::Receiver<FlightData>) {
    let request = ReceiverStream::new(rx).map(Ok::<FlightData, FlightError>);
    let mut results: BoxStream<'static, Result<PutResult, FlightError>> =
        match client.do_put(request).await {
            Ok(results) => results,
            Err(e) => {
                error!(dest = %address, error = %e, "Flight upload stream failed to open");
                return;
            }
        };

    while let Some(result) = results.next().await {
        if let Err(e) = result {
            warn!(dest = %address, error = %e, "Flight upload stream error");
            break;
        }
    }
    debug!(dest = %address, "Flight upload stream closed");
}

#[async_trait]
impl DestinationClient for FlightClient {
    async fn send(&self, _db: &str, _rp: &str, _payload: Bytes) -> Result<(), ContractError> {
        Err(ContractError::CapabilityMismatch {
            destination: self.address.clone(),
            client: "rpc",
            representation: "line protocol",
        })
    }

    async fn send_column(
        &self,
        db: &str,
        rp: &str,
        mst: &str,
        record: &RecordBatch,
    ) -> Result<(), ContractError> {
        let descriptor = FlightDescriptor::new_path(vec![descriptor_path(db, rp, mst)]);
        let mut encoder = FlightDataEncoderBuilder::new()
            .with_flight_descriptor(Some(descriptor))
            .build(stream::iter([Ok::<_, FlightError>(record.clone())]));

        let upload = self.upload.lock().await;
        while let Some(data) = encoder.next().await {
            let data = data.map_err(|e| ContractError::transport(&self.address, e.to_string()))?;
            upload
                .send(data)
                .await
                .map_err(|_| ContractError::transport(&self.address, "upload stream closed"))?;
        }
        Ok(())
    }

    fn destination(&self) -> &str {
        &self.address
    }

    fn capability(&self) -> Capability {
        Capability::ColumnarBatch
    }
}
