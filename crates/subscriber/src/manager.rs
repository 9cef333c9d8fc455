//! SubscriberManager - registry of running writers per (db, rp)
//!
//! The forwarding path takes a short read lock and clones the `Arc` list of
//! writers. Reconciliation builds writers without holding the lock and
//! swaps only the entries that changed.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    DiffPolicy, MetaClient, RecordBatch, SubscriberConfig, SubscriptionInfo, SubscriptionMode,
};
use dispatcher::{create_writer, DispatchWriter, MetricsSnapshot, WriteSummary, WriterState};

type WriterList = Arc<[Arc<DispatchWriter>]>;
type Registry = HashMap<String, HashMap<String, WriterList>>;

/// Identifies one writer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WriterKey {
    pub db: String,
    pub rp: String,
    pub sub: String,
}

impl WriterKey {
    fn new(db: &str, rp: &str, sub: &str) -> Self {
        Self {
            db: db.to_string(),
            rp: rp.to_string(),
            sub: sub.to_string(),
        }
    }
}

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<WriterKey>,
    pub removed: Vec<WriterKey>,
    /// Same name, different definition (`DiffPolicy::Full` only)
    pub restarted: Vec<WriterKey>,
    /// (db, rp) entries swapped in the registry
    pub changed_entries: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.restarted.is_empty()
            && self.changed_entries == 0
    }
}

/// Introspection row for one writer
#[derive(Debug, Clone, Serialize)]
pub struct WriterStatus {
    #[serde(flatten)]
    pub key: WriterKey,
    pub mode: SubscriptionMode,
    pub destinations: Vec<String>,
    #[serde(skip)]
    pub state: WriterState,
    #[serde(skip)]
    pub metrics: MetricsSnapshot,
}

/// Owns every DispatchWriter and routes writes to them
pub struct SubscriberManager {
    meta: Arc<dyn MetaClient>,
    config: SubscriberConfig,
    registry: RwLock<Registry>,
    reconcile_lock: Mutex<()>,
    last_applied: AtomicU64,
}

impl SubscriberManager {
    pub fn new(meta: Arc<dyn MetaClient>, config: SubscriberConfig) -> Self {
        Self {
            meta,
            config,
            registry: RwLock::new(Registry::new()),
            reconcile_lock: Mutex::new(()),
            last_applied: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    pub(crate) fn meta(&self) -> &Arc<dyn MetaClient> {
        &self.meta
    }

    /// Subscription id the registry was last built from
    pub fn last_applied(&self) -> u64 {
        self.last_applied.load(Ordering::Acquire)
    }

    /// Build and start a writer for every subscription in the catalog
    ///
    /// Subscriptions that fail to build are logged and skipped. Returns the
    /// number of writers started.
    #[instrument(name = "subscriber_init_writers", skip(self))]
    pub async fn init_writers(&self) -> usize {
        let _guard = self.reconcile_lock.lock().await;
        let baseline = self.meta.max_subscription_id();

        let mut registry = Registry::new();
        let mut started = 0;
        for (db_name, db) in self.meta.databases() {
            for rp in &db.retention_policies {
                let mut writers = Vec::with_capacity(rp.subscriptions.len());
                let mut seen = HashSet::new();
                for sub in &rp.subscriptions {
                    if !seen.insert(sub.name.as_str()) {
                        continue;
                    }
                    if let Some(writer) = self.start_writer(&db_name, &rp.name, sub).await {
                        writers.push(writer);
                    }
                }
                if !writers.is_empty() {
                    started += writers.len();
                    registry
                        .entry(db_name.clone())
                        .or_default()
                        .insert(rp.name.clone(), writers.into());
                }
            }
        }

        let previous = std::mem::replace(&mut *self.registry.write(), registry);
        for writer in previous.values().flat_map(|rps| rps.values()).flat_map(|l| l.iter()) {
            writer.stop();
        }

        self.last_applied.store(baseline, Ordering::Release);
        observability::set_writers_active(started);
        info!(writers = started, baseline, "Subscription writers initialized");
        started
    }

    /// Reconcile when the metadata service reports a newer subscription id
    pub async fn reconcile_if_changed(&self) -> Option<ReconcileReport> {
        let observed = self.meta.max_subscription_id();
        if observed <= self.last_applied() {
            return None;
        }
        let report = self.reconcile().await;
        self.last_applied.fetch_max(observed, Ordering::AcqRel);
        Some(report)
    }

    /// Bring the registry in line with the catalog
    #[instrument(name = "subscriber_reconcile", skip(self))]
    pub async fn reconcile(&self) -> ReconcileReport {
        let _guard = self.reconcile_lock.lock().await;
        let databases = self.meta.databases();
        let current = self.registry.read().clone();

        let mut report = ReconcileReport::default();
        let mut updates: Vec<(String, String, Option<WriterList>)> = Vec::new();
        let mut retired: Vec<Arc<DispatchWriter>> = Vec::new();

        for (db_name, db) in &databases {
            let existing_rps = current.get(db_name);

            for rp in &db.retention_policies {
                let existing = existing_rps
                    .and_then(|rps| rps.get(&rp.name))
                    .map(|list| &list[..])
                    .unwrap_or(&[]);
                let next = self
                    .diff_retention_policy(
                        db_name,
                        &rp.name,
                        existing,
                        &rp.subscriptions,
                        &mut report,
                        &mut retired,
                    )
                    .await;
                if let Some(next) = next {
                    let entry = (!next.is_empty()).then(|| WriterList::from(next));
                    updates.push((db_name.clone(), rp.name.clone(), entry));
                }
            }

            // Retention policies that left the catalog
            for (rp_name, writers) in existing_rps.into_iter().flatten() {
                if db.retention_policy(rp_name).is_none() {
                    retire_all(db_name, rp_name, writers, &mut report, &mut retired);
                    updates.push((db_name.clone(), rp_name.clone(), None));
                }
            }
        }

        // Databases that left the catalog
        for (db_name, rps) in &current {
            if databases.contains_key(db_name) {
                continue;
            }
            for (rp_name, writers) in rps {
                retire_all(db_name, rp_name, writers, &mut report, &mut retired);
                updates.push((db_name.clone(), rp_name.clone(), None));
            }
        }

        report.changed_entries = updates.len();
        if !updates.is_empty() {
            let mut registry = self.registry.write();
            for (db, rp, entry) in updates {
                match entry {
                    Some(writers) => {
                        registry.entry(db).or_default().insert(rp, writers);
                    }
                    None => {
                        if let Some(rps) = registry.get_mut(&db) {
                            rps.remove(&rp);
                            if rps.is_empty() {
                                registry.remove(&db);
                            }
                        }
                    }
                }
            }
        }

        for writer in &retired {
            writer.stop();
        }

        let active = self.writer_count();
        observability::set_writers_active(active);
        observability::record_reconcile(
            report.added.len() + report.restarted.len(),
            report.removed.len() + report.restarted.len(),
        );
        if report.is_empty() {
            debug!("Subscriptions unchanged");
        } else {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                restarted = report.restarted.len(),
                active,
                "Subscriptions reconciled"
            );
        }
        report
    }

    /// Diff one (db, rp); `None` when the entry stays as it is
    async fn diff_retention_policy(
        &self,
        db: &str,
        rp: &str,
        existing: &[Arc<DispatchWriter>],
        subscriptions: &[SubscriptionInfo],
        report: &mut ReconcileReport,
        retired: &mut Vec<Arc<DispatchWriter>>,
    ) -> Option<Vec<Arc<DispatchWriter>>> {
        let mut next = Vec::with_capacity(subscriptions.len());
        let mut seen = HashSet::new();
        let mut changed = false;

        for sub in subscriptions {
            if !seen.insert(sub.name.as_str()) {
                continue;
            }
            match existing.iter().find(|w| w.name() == sub.name) {
                Some(writer) if self.still_matches(writer, sub) => next.push(Arc::clone(writer)),
                Some(writer) => {
                    changed = true;
                    retired.push(Arc::clone(writer));
                    let key = WriterKey::new(db, rp, &sub.name);
                    match self.start_writer(db, rp, sub).await {
                        Some(writer) => {
                            next.push(writer);
                            report.restarted.push(key);
                        }
                        None => report.removed.push(key),
                    }
                }
                None => {
                    if let Some(writer) = self.start_writer(db, rp, sub).await {
                        changed = true;
                        next.push(writer);
                        report.added.push(WriterKey::new(db, rp, &sub.name));
                    }
                }
            }
        }

        for writer in existing {
            if !seen.contains(writer.name()) {
                changed = true;
                retired.push(Arc::clone(writer));
                report.removed.push(WriterKey::new(db, rp, writer.name()));
            }
        }

        changed.then_some(next)
    }

    fn still_matches(&self, writer: &DispatchWriter, sub: &SubscriptionInfo) -> bool {
        match self.config.diff_policy {
            DiffPolicy::Name => true,
            DiffPolicy::Full => writer.subscription() == sub,
        }
    }

    /// Build and start one writer; failures are logged
    async fn start_writer(
        &self,
        db: &str,
        rp: &str,
        sub: &SubscriptionInfo,
    ) -> Option<Arc<DispatchWriter>> {
        match create_writer(db, rp, sub, &self.config).await {
            Ok(writer) => {
                writer.start(self.config.write_concurrency, self.config.write_buffer_size);
                Some(Arc::new(writer))
            }
            Err(e) => {
                error!(db = %db, rp = %rp, sub = %sub.name, error = %e, "failed to create subscription writer");
                None
            }
        }
    }

    /// Forward an encoded write to every writer of (db, rp)
    ///
    /// An empty `rp` means the database's default retention policy.
    pub fn send(&self, db: &str, rp: &str, payload: Bytes) -> WriteSummary {
        let mut summary = WriteSummary::default();
        for writer in self.route(db, rp).iter() {
            summary.merge(writer.write(payload.clone()));
        }
        summary
    }

    /// Forward a columnar record to every writer of (db, rp)
    pub fn send_column(&self, db: &str, rp: &str, mst: &str, record: &RecordBatch) -> WriteSummary {
        let mut summary = WriteSummary::default();
        for writer in self.route(db, rp).iter() {
            summary.merge(writer.write_column(mst, record));
        }
        summary
    }

    fn route(&self, db: &str, rp: &str) -> WriterList {
        let empty = || WriterList::from(Vec::new());
        if !self.config.enabled {
            return empty();
        }

        let rp: Cow<'_, str> = if rp.is_empty() {
            match self.meta.database(db) {
                Ok(info) => Cow::Owned(info.default_retention_policy.clone()),
                Err(e) => {
                    warn!(db = %db, error = %e, "failed to resolve default retention policy, write dropped");
                    observability::record_unresolved_write(db);
                    return empty();
                }
            }
        } else {
            Cow::Borrowed(rp)
        };

        self.registry
            .read()
            .get(db)
            .and_then(|rps| rps.get(rp.as_ref()))
            .cloned()
            .unwrap_or_else(empty)
    }

    /// Stop every writer, wait for the drains and empty the registry
    #[instrument(name = "subscriber_stop_all_writers", skip(self))]
    pub async fn stop_all_writers(&self) {
        let _guard = self.reconcile_lock.lock().await;
        let registry = std::mem::take(&mut *self.registry.write());

        let writers: Vec<_> = registry
            .into_values()
            .flat_map(|rps| rps.into_values())
            .flat_map(|list| list.iter().cloned().collect::<Vec<_>>())
            .collect();
        for writer in &writers {
            writer.stop();
        }
        for writer in &writers {
            writer.join().await;
        }

        observability::set_writers_active(0);
        info!(writers = writers.len(), "All subscription writers stopped");
    }

    /// Writers currently registered for (db, rp), in subscription order
    pub fn writers(&self, db: &str, rp: &str) -> Vec<Arc<DispatchWriter>> {
        self.registry
            .read()
            .get(db)
            .and_then(|rps| rps.get(rp))
            .map(|list| list.to_vec())
            .unwrap_or_default()
    }

    pub fn writer_count(&self) -> usize {
        self.registry
            .read()
            .values()
            .flat_map(|rps| rps.values())
            .map(|list| list.len())
            .sum()
    }

    /// Status of every writer, sorted by (db, rp) then subscription order
    pub fn snapshot(&self) -> Vec<WriterStatus> {
        let registry = self.registry.read();
        let mut entries: Vec<_> = registry
            .iter()
            .flat_map(|(db, rps)| rps.iter().map(move |(rp, list)| (db, rp, list)))
            .collect();
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        entries
            .into_iter()
            .flat_map(|(db, rp, list)| {
                list.iter().map(move |writer| WriterStatus {
                    key: WriterKey::new(db, rp, writer.name()),
                    mode: writer.mode(),
                    destinations: writer.subscription().destinations.clone(),
                    state: writer.state(),
                    metrics: writer.metrics().snapshot(),
                })
            })
            .collect()
    }
}

fn retire_all(
    db: &str,
    rp: &str,
    writers: &WriterList,
    report: &mut ReconcileReport,
    retired: &mut Vec<Arc<DispatchWriter>>,
) {
    for writer in writers.iter() {
        report.removed.push(WriterKey::new(db, rp, writer.name()));
        retired.push(Arc::clone(writer));
    }
}
