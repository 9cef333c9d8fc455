//! Destination client implementations
//!
//! Contains HttpClient (http / https) and FlightClient (rpc).

mod flight;
mod http;

pub use self::flight::{descriptor_path, FlightClient};
pub use self::http::HttpClient;

use contracts::{Capability, ContractError, DestinationClient, SubscriberConfig};
use std::sync::Arc;
use url::Url;

/// Transport selected by a destination's URI scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Https,
    Flight,
}

impl Transport {
    /// Parse `destination` and classify its scheme
    ///
    /// # Errors
    /// Malformed URI or unknown scheme
    pub fn classify(destination: &str) -> Result<(Self, Url), ContractError> {
        let url = Url::parse(destination)
            .map_err(|e| ContractError::invalid_destination(destination, e.to_string()))?;
        let transport = match url.scheme() {
            "http" => Self::Http,
            "https" => Self::Https,
            "rpc" => Self::Flight,
            other => {
                return Err(ContractError::UnknownScheme {
                    destination: destination.to_string(),
                    scheme: other.to_string(),
                })
            }
        };
        Ok((transport, url))
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Http | Self::Https => Capability::EncodedPayload,
            Self::Flight => Capability::ColumnarBatch,
        }
    }
}

/// Build the client for one destination
pub async fn connect(
    destination: &str,
    config: &SubscriberConfig,
) -> Result<Arc<dyn DestinationClient>, ContractError> {
    let (transport, url) = Transport::classify(destination)?;
    match transport {
        Transport::Http => Ok(Arc::new(HttpClient::new(destination, config.http_timeout())?)),
        Transport::Https => Ok(Arc::new(HttpClient::new_https(
            destination,
            config.http_timeout(),
            config.insecure_skip_verify,
            config.https_certificate.as_deref(),
        )?)),
        Transport::Flight => {
            let address = flight_address(&url)
                .ok_or_else(|| ContractError::invalid_destination(destination, "missing host"))?;
            Ok(Arc::new(
                FlightClient::connect(&address, &config.flight_credential, config.http_timeout())
                    .await?,
            ))
        }
    }
}

/// `host[:port]` of an `rpc://` URI
fn flight_address(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_schemes() {
        assert_eq!(Transport::classify("http://a:8086").unwrap().0, Transport::Http);
        assert_eq!(Transport::classify("https://a:8086").unwrap().0, Transport::Https);
        assert_eq!(Transport::classify("rpc://a:8087").unwrap().0, Transport::Flight);
        assert_eq!(Transport::Flight.capability(), Capability::ColumnarBatch);
    }

    #[test]
    fn test_classify_unknown_scheme() {
        let err = Transport::classify("udp://a:8089").unwrap_err();
        assert!(matches!(err, ContractError::UnknownScheme { ref scheme, .. } if scheme == "udp"));
    }

    #[test]
    fn test_classify_malformed() {
        let err = Transport::classify("not a uri").unwrap_err();
        assert!(matches!(err, ContractError::InvalidDestination { .. }));
    }

    #[test]
    fn test_flight_address() {
        let url = Url::parse("rpc://10.0.0.1:8087").unwrap();
        assert_eq!(flight_address(&url).as_deref(), Some("10.0.0.1:8087"));
    }

    #[tokio::test]
    async fn test_connect_http() {
        let client = connect("http://127.0.0.1:8086", &SubscriberConfig::default())
            .await
            .unwrap();
        assert_eq!(client.destination(), "http://127.0.0.1:8086");
        assert_eq!(client.capability(), Capability::EncodedPayload);
    }
}
