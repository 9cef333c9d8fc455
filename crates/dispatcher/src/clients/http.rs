//! HttpClient - line protocol over HTTP / HTTPS
//!
//! POSTs the encoded payload to `<destination>/write?db=..&rp=..`.

use async_trait::async_trait;
use bytes::Bytes;
use contracts::{Capability, ContractError, DestinationClient, RecordBatch};
use reqwest::{Certificate, Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Client for `http://` and `https://` destinations
pub struct HttpClient {
    destination: String,
    write_url: Url,
    client: Client,
}

impl HttpClient {
    /// Plain HTTP client with a per-request timeout
    pub fn new(destination: impl Into<String>, timeout: Duration) -> Result<Self, ContractError> {
        let destination = destination.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContractError::invalid_destination(&destination, e.to_string()))?;
        Self::with_client(destination, client)
    }

    /// HTTPS client
    ///
    /// `ca_bundle` is read now; a missing or empty bundle fails construction.
    #[instrument(name = "http_client_new_https", skip(timeout))]
    pub fn new_https(
        destination: &str,
        timeout: Duration,
        skip_verify: bool,
        ca_bundle: Option<&Path>,
    ) -> Result<Self, ContractError> {
        let destination = destination.to_string();
        let mut builder = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_verify);

        if let Some(path) = ca_bundle {
            for cert in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder.build().map_err(|e| ContractError::Tls {
            path: ca_bundle
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            message: e.to_string(),
        })?;
        Self::with_client(destination, client)
    }

    /// Wrap an existing reqwest client
    pub fn with_client(destination: String, client: Client) -> Result<Self, ContractError> {
        let base = destination.trim_end_matches('/');
        let write_url = Url::parse(&format!("{base}/write"))
            .map_err(|e| ContractError::invalid_destination(&destination, e.to_string()))?;

        debug!(dest = %destination, url = %write_url, "HttpClient ready");

        Ok(Self {
            destination,
            write_url,
            client,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

/// Read every certificate from a PEM bundle
fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>, ContractError> {
    let tls_error = |message: String| ContractError::Tls {
        path: path.display().to_string(),
        message,
    };

    let pem = std::fs::read(path).map_err(|e| tls_error(e.to_string()))?;
    let certs = Certificate::from_pem_bundle(&pem).map_err(|e| tls_error(e.to_string()))?;
    if certs.is_empty() {
        return Err(tls_error("no certificates found".to_string()));
    }
    Ok(certs)
}

#[async_trait]
impl DestinationClient for HttpClient {
    async fn send(&self, db: &str, rp: &str, payload: Bytes) -> Result<(), ContractError> {
        let response = self
            .client
            .post(self.write_url.clone())
            .query(&[("db", db), ("rp", rp)])
            .body(payload)
            .send()
            .await
            .map_err(|e| ContractError::transport(&self.destination, e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::OK {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ContractError::transport(&self.destination, e.to_string()))?;
        Err(ContractError::Status {
            destination: self.destination.clone(),
            status: status.as_u16(),
            body,
        })
    }

    async fn send_column(
        &self,
        _db: &str,
        _rp: &str,
        _mst: &str,
        _record: &RecordBatch,
    ) -> Result<(), ContractError> {
        Err(ContractError::CapabilityMismatch {
            destination: self.destination.clone(),
            client: "http",
            representation: "columnar batches",
        })
    }

    fn destination(&self) -> &str {
        &self.destination
    }

    fn capability(&self) -> Capability {
        Capability::EncodedPayload
    }
}
