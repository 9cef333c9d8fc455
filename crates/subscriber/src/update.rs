//! Change-notification loop
//!
//! Parks on the metadata service's change signal and reconciles when the
//! subscription id has advanced.

use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::manager::SubscriberManager;

impl SubscriberManager {
    /// Run until the change channel closes or `shutdown` fires
    ///
    /// `shutdown` fires when its value becomes `true` or its sender is dropped.
    #[instrument(name = "subscriber_update_loop", skip_all)]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut changes = self.meta().watch_changes();
        info!("Subscription update loop started");

        // Changes made between init_writers and subscribing
        self.reconcile_if_changed().await;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        info!("Metadata change channel closed");
                        break;
                    }
                    match self.reconcile_if_changed().await {
                        Some(report) => debug!(
                            added = report.added.len(),
                            removed = report.removed.len(),
                            "Change applied"
                        ),
                        None => debug!("Metadata changed, subscriptions did not"),
                    }
                }
                stopped = shutdown.changed() => {
                    if stopped.is_err() {
                        break;
                    }
                }
            }
        }

        info!(last_applied = self.last_applied(), "Subscription update loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::SubscriberManager;
    use crate::memory::MemoryMetaClient;
    use contracts::{MetaClient, SubscriberConfig, SubscriptionInfo, SubscriptionMode};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    async fn wait_for(manager: &SubscriberManager, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.writer_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("writer count not reached");
    }

    #[tokio::test]
    async fn test_loop_applies_changes_until_shutdown() {
        let meta = Arc::new(MemoryMetaClient::new());
        meta.create_database("telemetry", "autogen").unwrap();
        let manager = Arc::new(SubscriberManager::new(meta.clone(), SubscriberConfig::default()));
        manager.init_writers().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.run(shutdown_rx).await }
        });

        meta.create_subscription(
            "telemetry",
            "autogen",
            SubscriptionInfo::new("s1", SubscriptionMode::Any, ["http://127.0.0.1:1"]),
        )
        .unwrap();
        wait_for(&manager, 1).await;
        assert_eq!(manager.last_applied(), meta.max_subscription_id());

        meta.drop_subscription("telemetry", "autogen", "s1").unwrap();
        wait_for(&manager, 0).await;

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop did not stop")
            .unwrap();
        manager.stop_all_writers().await;
    }

    #[tokio::test]
    async fn test_loop_exits_when_shutdown_sender_dropped() {
        let meta = Arc::new(MemoryMetaClient::new());
        let manager = SubscriberManager::new(meta, SubscriberConfig::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(5), manager.run(shutdown_rx))
            .await
            .expect("loop did not stop");
    }

    #[tokio::test]
    async fn test_loop_picks_up_changes_made_before_it_started() {
        let meta = Arc::new(MemoryMetaClient::new());
        meta.create_database("telemetry", "autogen").unwrap();
        let manager = Arc::new(SubscriberManager::new(meta.clone(), SubscriberConfig::default()));
        manager.init_writers().await;

        meta.create_subscription(
            "telemetry",
            "autogen",
            SubscriptionInfo::new("early", SubscriptionMode::All, ["http://127.0.0.1:1"]),
        )
        .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.run(shutdown_rx).await }
        });
        wait_for(&manager, 1).await;

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        manager.stop_all_writers().await;
    }
}
