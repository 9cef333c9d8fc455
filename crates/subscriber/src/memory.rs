//! MemoryMetaClient - in-process metadata service
//!
//! Backs the CLI (seeded from a catalog file) and the tests. Every
//! subscription mutation advances the subscription id and signals watchers.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use contracts::{
    CatalogSpec, ContractError, DatabaseInfo, MetaClient, RetentionPolicyInfo, SubscriptionInfo,
};

#[derive(Default)]
struct MetaState {
    databases: BTreeMap<String, Arc<DatabaseInfo>>,
    max_subscription_id: u64,
    version: u64,
}

/// Metadata service held entirely in memory
pub struct MemoryMetaClient {
    state: RwLock<MetaState>,
    changes: watch::Sender<u64>,
}

impl Default for MemoryMetaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetaClient {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: RwLock::new(MetaState::default()),
            changes,
        }
    }

    /// Seed from a catalog; each subscription gets its own id
    pub fn from_catalog(catalog: CatalogSpec) -> Self {
        let meta = Self::new();
        meta.replace_catalog(catalog);
        meta
    }

    pub fn create_database(
        &self,
        name: &str,
        default_retention_policy: &str,
    ) -> Result<(), ContractError> {
        self.mutate(false, |state| {
            if state.databases.contains_key(name) {
                return Err(ContractError::Other(format!("database '{name}' already exists")));
            }
            state.databases.insert(
                name.to_string(),
                Arc::new(DatabaseInfo::new(name, default_retention_policy)),
            );
            Ok(())
        })
    }

    pub fn create_retention_policy(&self, db: &str, rp: &str) -> Result<(), ContractError> {
        self.mutate(false, |state| {
            let database = database_mut(state, db)?;
            if database.retention_policy(rp).is_some() {
                return Err(ContractError::Other(format!(
                    "retention policy '{db}.{rp}' already exists"
                )));
            }
            database.retention_policies.push(RetentionPolicyInfo::new(rp));
            Ok(())
        })
    }

    /// Add a subscription; returns its id
    pub fn create_subscription(
        &self,
        db: &str,
        rp: &str,
        subscription: SubscriptionInfo,
    ) -> Result<u64, ContractError> {
        self.mutate(true, |state| {
            let policy = retention_policy_mut(state, db, rp)?;
            if policy.subscriptions.iter().any(|s| s.name == subscription.name) {
                return Err(ContractError::Other(format!(
                    "subscription '{}' already exists on {db}.{rp}",
                    subscription.name
                )));
            }
            policy.subscriptions.push(subscription);
            Ok(state.max_subscription_id + 1)
        })
    }

    pub fn drop_subscription(&self, db: &str, rp: &str, name: &str) -> Result<(), ContractError> {
        self.mutate(true, |state| {
            let policy = retention_policy_mut(state, db, rp)?;
            let before = policy.subscriptions.len();
            policy.subscriptions.retain(|s| s.name != name);
            if policy.subscriptions.len() == before {
                return Err(ContractError::Other(format!(
                    "subscription '{name}' not found on {db}.{rp}"
                )));
            }
            Ok(())
        })
    }

    /// Swap the whole catalog (file reload)
    pub fn replace_catalog(&self, catalog: CatalogSpec) {
        let count = catalog.subscription_count() as u64;
        let mut state = self.state.write();
        state.databases = catalog
            .databases
            .into_iter()
            .map(|db| (db.name.clone(), Arc::new(db)))
            .collect();
        state.max_subscription_id += count.max(1);
        state.version += 1;
        self.changes.send_replace(state.version);
        debug!(
            databases = state.databases.len(),
            max_subscription_id = state.max_subscription_id,
            "Catalog replaced"
        );
    }

    /// Apply `f`; on success bump the version (and the subscription id
    /// when `subscription` is set) and notify watchers
    fn mutate<T>(
        &self,
        subscription: bool,
        f: impl FnOnce(&mut MetaState) -> Result<T, ContractError>,
    ) -> Result<T, ContractError> {
        let mut state = self.state.write();
        let result = f(&mut state)?;
        if subscription {
            state.max_subscription_id += 1;
        }
        state.version += 1;
        self.changes.send_replace(state.version);
        Ok(result)
    }
}

fn database_mut<'a>(state: &'a mut MetaState, db: &str) -> Result<&'a mut DatabaseInfo, ContractError> {
    state
        .databases
        .get_mut(db)
        .map(Arc::make_mut)
        .ok_or_else(|| ContractError::UnknownDatabase(db.to_string()))
}

fn retention_policy_mut<'a>(
    state: &'a mut MetaState,
    db: &str,
    rp: &str,
) -> Result<&'a mut RetentionPolicyInfo, ContractError> {
    database_mut(state, db)?
        .retention_policy_mut(rp)
        .ok_or_else(|| ContractError::Other(format!("retention policy '{db}.{rp}' not found")))
}

impl MetaClient for MemoryMetaClient {
    fn databases(&self) -> BTreeMap<String, Arc<DatabaseInfo>> {
        self.state.read().databases.clone()
    }

    fn database(&self, name: &str) -> Result<Arc<DatabaseInfo>, ContractError> {
        self.state
            .read()
            .databases
            .get(name)
            .cloned()
            .ok_or_else(|| ContractError::UnknownDatabase(name.to_string()))
    }

    fn max_subscription_id(&self) -> u64 {
        self.state.read().max_subscription_id
    }

    fn watch_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
