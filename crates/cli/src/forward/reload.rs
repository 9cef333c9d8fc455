//! Catalog reload on SIGHUP.

use std::path::PathBuf;
use std::sync::Arc;

use subscriber::MemoryMetaClient;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Re-read `path` into `meta` on every SIGHUP until `shutdown` fires
///
/// A catalog that fails to load is logged and the current one kept.
#[cfg(unix)]
pub async fn reload_on_hangup(
    path: PathBuf,
    meta: Arc<MemoryMetaClient>,
    mut shutdown: watch::Receiver<bool>,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler, catalog reload disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                match config_loader::ConfigLoader::load_catalog_from_path(&path) {
                    Ok(catalog) => {
                        info!(
                            path = %path.display(),
                            subscriptions = catalog.subscription_count(),
                            "Catalog reloaded"
                        );
                        meta.replace_catalog(catalog);
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "Catalog reload failed, keeping current catalog");
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_hangup(
    _path: PathBuf,
    _meta: Arc<MemoryMetaClient>,
    mut shutdown: watch::Receiver<bool>,
) {
    let _ = shutdown.changed().await;
}
