//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! Covers:
//! - Catalog files through the config loader into the manager
//! - Forwarding to stub HTTP destinations
//! - Reconciliation while traffic flows

#[cfg(test)]
mod stub;

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::SubscriptionMode;

    #[test]
    fn test_catalog_toml_roundtrip() {
        let toml = r#"
[[databases]]
name = "telemetry"
default_retention_policy = "autogen"

[[databases.retention_policies]]
name = "autogen"

[[databases.retention_policies.subscriptions]]
name = "sub1"
mode = "ANY"
destinations = ["http://a:8086", "http://b:8086"]
"#;
        let catalog = ConfigLoader::load_catalog_from_str(toml, ConfigFormat::Toml).unwrap();
        let sub = &catalog.databases[0].retention_policies[0].subscriptions[0];
        assert_eq!(sub.mode.parse::<SubscriptionMode>().unwrap(), SubscriptionMode::Any);

        let json = ConfigLoader::to_json(&catalog).unwrap();
        let back = ConfigLoader::load_catalog_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(back, catalog);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use bytes::Bytes;
    use contracts::{SubscriberConfig, SubscriptionInfo, SubscriptionMode};
    use subscriber::{MemoryMetaClient, SubscriberManager};

    use crate::stub::StubDestination;

    const DB: &str = "telemetry";
    const RP: &str = "autogen";

    fn config() -> SubscriberConfig {
        SubscriberConfig {
            http_timeout_ms: 2_000,
            write_concurrency: 2,
            write_buffer_size: 64,
            ..SubscriberConfig::default()
        }
    }

    fn meta_with(subs: Vec<SubscriptionInfo>) -> Arc<MemoryMetaClient> {
        let meta = Arc::new(MemoryMetaClient::new());
        meta.create_database(DB, RP).unwrap();
        for sub in subs {
            meta.create_subscription(DB, RP, sub).unwrap();
        }
        meta
    }

    /// ALL subscription with one healthy and one failing destination:
    /// both receive the write, the caller sees no error
    #[tokio::test]
    async fn test_broadcast_with_failing_destination() {
        let healthy = StubDestination::spawn(StatusCode::NO_CONTENT).await;
        let failing = StubDestination::spawn(StatusCode::INTERNAL_SERVER_ERROR).await;

        let meta = meta_with(vec![SubscriptionInfo::new(
            "sub1",
            SubscriptionMode::All,
            [healthy.url(), failing.url()],
        )]);
        let manager = SubscriberManager::new(meta, config());
        assert_eq!(manager.init_writers().await, 1);

        let summary = manager.send(DB, RP, Bytes::from_static(b"cpu value=1 1"));
        assert_eq!(summary.queued, 2);

        healthy.wait_for(1).await;
        failing.wait_for(1).await;
        for stub in [&healthy, &failing] {
            let (params, body) = stub.requests()[0].clone();
            assert_eq!(params.get("db").map(String::as_str), Some(DB));
            assert_eq!(params.get("rp").map(String::as_str), Some(RP));
            assert_eq!(body.as_ref(), b"cpu value=1 1");
        }

        manager.stop_all_writers().await;
    }

    #[tokio::test]
    async fn test_rotation_spreads_writes() {
        let a = StubDestination::spawn(StatusCode::NO_CONTENT).await;
        let b = StubDestination::spawn(StatusCode::NO_CONTENT).await;

        let meta = meta_with(vec![SubscriptionInfo::new(
            "sub1",
            SubscriptionMode::Any,
            [a.url(), b.url()],
        )]);
        let manager = SubscriberManager::new(meta, config());
        manager.init_writers().await;

        for i in 0..6 {
            let summary = manager.send(DB, "", Bytes::from(format!("cpu value={i}")));
            assert_eq!(summary.queued, 1);
        }

        manager.stop_all_writers().await;
        assert_eq!(a.requests().len(), 3);
        assert_eq!(b.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_reconcile_routes_to_new_subscription() {
        let first = StubDestination::spawn(StatusCode::NO_CONTENT).await;
        let second = StubDestination::spawn(StatusCode::OK).await;

        let meta = meta_with(vec![SubscriptionInfo::new(
            "first",
            SubscriptionMode::All,
            [first.url()],
        )]);
        let manager = SubscriberManager::new(meta.clone(), config());
        manager.init_writers().await;

        manager.send(DB, RP, Bytes::from_static(b"m v=1"));
        first.wait_for(1).await;

        meta.drop_subscription(DB, RP, "first").unwrap();
        meta.create_subscription(
            DB,
            RP,
            SubscriptionInfo::new("second", SubscriptionMode::All, [second.url()]),
        )
        .unwrap();
        let report = manager.reconcile_if_changed().await.unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.removed.len(), 1);

        manager.send(DB, RP, Bytes::from_static(b"m v=2"));
        second.wait_for(1).await;

        manager.stop_all_writers().await;
        assert_eq!(first.requests().len(), 1);
        assert_eq!(second.requests()[0].1.as_ref(), b"m v=2");
    }

    #[tokio::test]
    async fn test_unreachable_destination_does_not_block_others() {
        let healthy = StubDestination::spawn(StatusCode::NO_CONTENT).await;

        let meta = meta_with(vec![
            SubscriptionInfo::new("dead", SubscriptionMode::All, ["http://127.0.0.1:1"]),
            SubscriptionInfo::new("live", SubscriptionMode::All, [healthy.url()]),
        ]);
        let manager = SubscriberManager::new(meta, config());
        manager.init_writers().await;

        for _ in 0..5 {
            manager.send(DB, RP, Bytes::from_static(b"m v=1"));
        }
        healthy.wait_for(5).await;

        let snapshot = manager.snapshot();
        let subs: Vec<_> = snapshot.iter().map(|s| s.key.sub.as_str()).collect();
        assert_eq!(subs, vec!["dead", "live"]);
        assert_eq!(snapshot[1].metrics.queued_count, 5);

        manager.stop_all_writers().await;
        assert!(manager.snapshot().is_empty());
    }
}
