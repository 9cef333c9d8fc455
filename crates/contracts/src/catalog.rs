//! Catalog - metadata service view of databases and subscriptions
//!
//! The metadata service owns these definitions; the subscriber only reads
//! them through [`MetaClient`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::ContractError;

/// Fan-out mode of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionMode {
    /// Broadcast every write to every destination
    #[serde(rename = "ALL")]
    All,
    /// Rotate writes across destinations
    #[serde(rename = "ANY")]
    Any,
}

impl SubscriptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Any => "ANY",
        }
    }
}

impl FromStr for SubscriptionMode {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(Self::All),
            "ANY" => Ok(Self::Any),
            other => Err(ContractError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named forwarding rule attached to one retention policy
///
/// `mode` is kept as the raw string the metadata service stores; it is
/// parsed when the writer is built so a bad mode only fails that writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub name: String,
    pub mode: String,
    pub destinations: Vec<String>,
}

impl SubscriptionInfo {
    pub fn new(
        name: impl Into<String>,
        mode: SubscriptionMode,
        destinations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            mode: mode.as_str().to_string(),
            destinations: destinations.into_iter().map(Into::into).collect(),
        }
    }
}

/// Retention policy with its subscriptions (in definition order)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyInfo {
    pub name: String,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionInfo>,
}

impl RetentionPolicyInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: Vec::new(),
        }
    }
}

/// Database definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub default_retention_policy: String,
    #[serde(default)]
    pub retention_policies: Vec<RetentionPolicyInfo>,
}

impl DatabaseInfo {
    pub fn new(name: impl Into<String>, default_retention_policy: impl Into<String>) -> Self {
        let default_retention_policy = default_retention_policy.into();
        Self {
            name: name.into(),
            retention_policies: vec![RetentionPolicyInfo::new(default_retention_policy.clone())],
            default_retention_policy,
        }
    }

    /// Look up a retention policy by name
    pub fn retention_policy(&self, name: &str) -> Option<&RetentionPolicyInfo> {
        self.retention_policies.iter().find(|rp| rp.name == name)
    }

    pub fn retention_policy_mut(&mut self, name: &str) -> Option<&mut RetentionPolicyInfo> {
        self.retention_policies.iter_mut().find(|rp| rp.name == name)
    }
}

/// Full catalog as loaded from a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub databases: Vec<DatabaseInfo>,
}

impl CatalogSpec {
    /// Number of subscriptions across all databases
    pub fn subscription_count(&self) -> usize {
        self.databases
            .iter()
            .flat_map(|db| db.retention_policies.iter())
            .map(|rp| rp.subscriptions.len())
            .sum()
    }
}

/// Metadata service contract consumed by the subscriber
pub trait MetaClient: Send + Sync {
    /// All databases, keyed by name
    fn databases(&self) -> BTreeMap<String, Arc<DatabaseInfo>>;

    /// A single database
    ///
    /// # Errors
    /// `ContractError::UnknownDatabase` if it does not exist
    fn database(&self, name: &str) -> Result<Arc<DatabaseInfo>, ContractError>;

    /// Highest subscription id ever assigned; never decreases
    fn max_subscription_id(&self) -> u64;

    /// Receiver signalled whenever metadata changes
    ///
    /// The channel closing means the service is gone.
    fn watch_changes(&self) -> watch::Receiver<u64>;
}
