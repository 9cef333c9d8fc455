//! WriterBuilder - turn one subscription definition into a DispatchWriter

use std::sync::Arc;

use tracing::{debug, instrument};

use contracts::{
    Capability, ContractError, DestinationClient, SubscriberConfig, SubscriptionInfo,
    SubscriptionMode,
};

use crate::clients::{self, Transport};
use crate::error::DispatcherError;
use crate::writer::DispatchWriter;

/// Builder for creating a DispatchWriter
pub struct WriterBuilder<'a> {
    db: &'a str,
    rp: &'a str,
    subscription: &'a SubscriptionInfo,
    config: &'a SubscriberConfig,
}

impl<'a> WriterBuilder<'a> {
    pub fn new(
        db: &'a str,
        rp: &'a str,
        subscription: &'a SubscriptionInfo,
        config: &'a SubscriberConfig,
    ) -> Self {
        Self {
            db,
            rp,
            subscription,
            config,
        }
    }

    /// Build the writer in the Created state
    ///
    /// All-or-nothing: any destination that fails to produce a client fails
    /// the whole writer.
    #[instrument(
        name = "writer_builder_build",
        skip(self),
        fields(db = %self.db, rp = %self.rp, sub = %self.subscription.name)
    )]
    pub async fn build(self) -> Result<DispatchWriter, DispatcherError> {
        let name = &self.subscription.name;
        let wrap = |e: ContractError| DispatcherError::writer_creation(name, e);

        let mode: SubscriptionMode = self.subscription.mode.parse().map_err(wrap)?;
        if self.subscription.destinations.is_empty() {
            return Err(wrap(ContractError::config_validation(
                "destinations",
                "subscription has no destinations",
            )));
        }

        // Classify everything before opening any connection
        let mut capability: Option<Capability> = None;
        for destination in &self.subscription.destinations {
            let (transport, _) = Transport::classify(destination).map_err(wrap)?;
            match capability {
                None => capability = Some(transport.capability()),
                Some(existing) if existing != transport.capability() => {
                    return Err(wrap(ContractError::config_validation(
                        "destinations",
                        format!(
                            "'{destination}' takes {} but earlier destinations take {existing}",
                            transport.capability()
                        ),
                    )));
                }
                Some(_) => {}
            }
        }

        let clients = self.initialize_clients().await.map_err(wrap)?;
        debug!(clients = clients.len(), mode = %mode, "Writer clients ready");

        Ok(DispatchWriter::new(
            self.db,
            self.rp,
            self.subscription.clone(),
            mode,
            clients,
        ))
    }

    async fn initialize_clients(&self) -> Result<Vec<Arc<dyn DestinationClient>>, ContractError> {
        let mut clients = Vec::with_capacity(self.subscription.destinations.len());
        for destination in &self.subscription.destinations {
            clients.push(clients::connect(destination, self.config).await?);
        }
        Ok(clients)
    }
}

/// Convenience function to build a writer for one subscription
pub async fn create_writer(
    db: &str,
    rp: &str,
    subscription: &SubscriptionInfo,
    config: &SubscriberConfig,
) -> Result<DispatchWriter, DispatcherError> {
    WriterBuilder::new(db, rp, subscription, config).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WriterState;

    fn subscription(mode: &str, destinations: &[&str]) -> SubscriptionInfo {
        SubscriptionInfo {
            name: "sub1".to_string(),
            mode: mode.to_string(),
            destinations: destinations.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_build_http_writer() {
        let sub = subscription("ALL", &["http://127.0.0.1:8086", "http://127.0.0.1:8087"]);
        let writer = create_writer("telemetry", "autogen", &sub, &SubscriberConfig::default())
            .await
            .unwrap();

        assert_eq!(writer.name(), "sub1");
        assert_eq!(writer.mode(), SubscriptionMode::All);
        assert_eq!(writer.state(), WriterState::Created);
        let destinations: Vec<_> = writer.clients().iter().map(|c| c.destination()).collect();
        assert_eq!(destinations, vec!["http://127.0.0.1:8086", "http://127.0.0.1:8087"]);
    }

    #[tokio::test]
    async fn test_unknown_mode_fails() {
        let sub = subscription("SOME", &["http://127.0.0.1:8086"]);
        let err = create_writer("db", "rp", &sub, &SubscriberConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatcherError::WriterCreation { source: ContractError::UnknownMode(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_destinations_fail() {
        let sub = subscription("ANY", &[]);
        let err = create_writer("db", "rp", &sub, &SubscriberConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sub1"));
    }

    #[tokio::test]
    async fn test_unknown_scheme_fails_whole_writer() {
        let sub = subscription("ALL", &["http://127.0.0.1:8086", "udp://127.0.0.1:8089"]);
        let err = create_writer("db", "rp", &sub, &SubscriberConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatcherError::WriterCreation { source: ContractError::UnknownScheme { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn test_mixed_capabilities_rejected() {
        let sub = subscription("ANY", &["http://127.0.0.1:8086", "rpc://127.0.0.1:8087"]);
        let err = create_writer("db", "rp", &sub, &SubscriberConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatcherError::WriterCreation { source: ContractError::ConfigValidation { .. }, .. }
        ));
    }

    #[tokio::test]
    async fn test_https_bad_bundle_fails_whole_writer() {
        let config = SubscriberConfig {
            https_certificate: Some("/nonexistent/ca.pem".into()),
            ..SubscriberConfig::default()
        };
        let sub = subscription("ALL", &["http://127.0.0.1:8086", "https://127.0.0.1:8443"]);
        let err = create_writer("db", "rp", &sub, &config).await.unwrap_err();
        assert!(matches!(
            err,
            DispatcherError::WriterCreation { source: ContractError::Tls { .. }, .. }
        ));
    }
}
