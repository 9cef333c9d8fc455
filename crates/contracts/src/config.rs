//! SubscriberConfig - process-level forwarding settings
//!
//! Shared by every writer the manager builds.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How reconciliation decides that a running writer still matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffPolicy {
    /// Compare subscription names only; in-place edits under the same
    /// name are not picked up
    #[default]
    Name,
    /// Compare name, mode and destinations; an edited subscription is
    /// stopped and rebuilt
    Full,
}

/// Subscriber configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Forwarding on/off
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-request timeout for HTTP/HTTPS destinations; also bounds the
    /// Flight connect and handshake
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Accept any server certificate on HTTPS destinations
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Extra CA bundle (PEM) trusted by HTTPS destinations
    #[serde(default)]
    pub https_certificate: Option<PathBuf>,

    /// Worker tasks per writer
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,

    /// Queue capacity per writer
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,

    /// Credential sent during the Flight handshake
    #[serde(default)]
    pub flight_credential: String,

    /// Reconciliation diff policy
    #[serde(default)]
    pub diff_policy: DiffPolicy,
}

fn default_enabled() -> bool {
    true
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_write_concurrency() -> usize {
    40
}

fn default_write_buffer_size() -> usize {
    1000
}

impl SubscriberConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            http_timeout_ms: default_http_timeout_ms(),
            insecure_skip_verify: false,
            https_certificate: None,
            write_concurrency: default_write_concurrency(),
            write_buffer_size: default_write_buffer_size(),
            flight_credential: String::new(),
            diff_policy: DiffPolicy::default(),
        }
    }
}
