//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use subscriber::{MemoryMetaClient, SubscriberManager};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::forward::{forward_stdin, reload_on_hangup, ForwardStats, ForwardTarget};

/// Execute the `run` command
pub async fn run_forwarder(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), catalog = %args.catalog.display(), "Loading configuration");

    let config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let catalog = ConfigLoader::load_catalog_from_path(&args.catalog)
        .with_context(|| format!("Failed to load catalog from {}", args.catalog.display()))?;

    info!(
        enabled = config.enabled,
        write_concurrency = config.write_concurrency,
        write_buffer_size = config.write_buffer_size,
        databases = catalog.databases.len(),
        subscriptions = catalog.subscription_count(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let meta = Arc::new(MemoryMetaClient::from_catalog(catalog));
    let manager = Arc::new(SubscriberManager::new(meta.clone(), config));
    let started = manager.init_writers().await;
    info!(writers = started, "Forwarder started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let update_loop = tokio::spawn({
        let manager = Arc::clone(&manager);
        let shutdown = shutdown_rx.clone();
        async move { manager.run(shutdown).await }
    });
    let reload = tokio::spawn(reload_on_hangup(
        args.catalog.clone(),
        Arc::clone(&meta),
        shutdown_rx,
    ));

    let mut stats = ForwardStats::default();
    match &args.db {
        Some(db) => {
            let target = ForwardTarget {
                db: db.clone(),
                rp: args.rp.clone(),
                batch_lines: args.batch_lines,
                flush_interval: Duration::from_millis(args.flush_ms.max(1)),
            };
            tokio::select! {
                result = forward_stdin(&manager, &target, &mut stats) => {
                    result.context("Forwarding stdin failed")?;
                }
                _ = shutdown_signal() => {
                    warn!("Received shutdown signal, stopping forwarder...");
                }
            }
        }
        None => {
            info!("No --db given, stdin is not forwarded; waiting for shutdown signal");
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping forwarder...");
        }
    }

    // Receivers may already be gone
    let _ = shutdown_tx.send(true);
    if let Err(e) = update_loop.await {
        warn!(error = %e, "Update loop task failed");
    }
    if let Err(e) = reload.await {
        warn!(error = %e, "Catalog reload task failed");
    }
    manager.stop_all_writers().await;

    if args.db.is_some() {
        stats.print_summary();
    }
    info!("subforward finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
