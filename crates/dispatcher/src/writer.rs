//! DispatchWriter - one subscription's clients, bounded queue and worker pool
//!
//! Lifecycle: Created -> Running -> Stopped. Enqueue never blocks: a full
//! queue drops the request, a writer that is not running rejects it.

use std::sync::Arc;
use std::time::Instant;

use async_channel::{Receiver, Sender, TrySendError};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    DestinationClient, Payload, RecordBatch, SubscriptionInfo, SubscriptionMode, WriteRequest,
};

use crate::metrics::WriterMetrics;

/// Observable writer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Created,
    Running,
    Stopped,
}

/// Result of handing one request to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Accepted; a worker will deliver it
    Queued,
    /// Queue full, request discarded
    Dropped,
    /// Writer not running, request discarded
    Rejected,
}

/// Per-call tally of enqueue outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub queued: usize,
    pub dropped: usize,
    pub rejected: usize,
}

impl WriteSummary {
    fn record(&mut self, outcome: EnqueueOutcome) {
        match outcome {
            EnqueueOutcome::Queued => self.queued += 1,
            EnqueueOutcome::Dropped => self.dropped += 1,
            EnqueueOutcome::Rejected => self.rejected += 1,
        }
    }

    /// Number of requests the call tried to enqueue
    pub fn attempts(&self) -> usize {
        self.queued + self.dropped + self.rejected
    }

    pub fn merge(&mut self, other: WriteSummary) {
        self.queued += other.queued;
        self.dropped += other.dropped;
        self.rejected += other.rejected;
    }
}

/// Fan-out strategy
enum FanOut {
    /// Every client receives every write
    Broadcast,
    /// One client per write, round-robin
    Rotation(Mutex<usize>),
}

impl FanOut {
    fn for_mode(mode: SubscriptionMode) -> Self {
        match mode {
            SubscriptionMode::All => Self::Broadcast,
            SubscriptionMode::Any => Self::Rotation(Mutex::new(0)),
        }
    }
}

/// Advance a rotation cursor and return the index it pointed at
fn next_target(cursor: &Mutex<usize>, clients: usize) -> usize {
    let mut cursor = cursor.lock();
    let target = *cursor;
    *cursor = (target + 1) % clients;
    target
}

enum Lifecycle {
    Created,
    Running {
        tx: Sender<WriteRequest>,
        workers: Vec<JoinHandle<()>>,
    },
    Stopped {
        workers: Vec<JoinHandle<()>>,
    },
}

/// State shared with the worker tasks
struct WriterCore {
    name: String,
    db: String,
    rp: String,
    clients: Vec<Arc<dyn DestinationClient>>,
    metrics: WriterMetrics,
}

/// Forwards writes of one subscription to its destinations
pub struct DispatchWriter {
    core: Arc<WriterCore>,
    subscription: SubscriptionInfo,
    mode: SubscriptionMode,
    fan_out: FanOut,
    lifecycle: RwLock<Lifecycle>,
}

impl std::fmt::Debug for DispatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWriter")
            .field("name", &self.core.name)
            .field("db", &self.core.db)
            .field("rp", &self.core.rp)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DispatchWriter {
    /// Create a writer in the Created state
    ///
    /// `clients` must line up with `subscription.destinations`.
    pub fn new(
        db: impl Into<String>,
        rp: impl Into<String>,
        subscription: SubscriptionInfo,
        mode: SubscriptionMode,
        clients: Vec<Arc<dyn DestinationClient>>,
    ) -> Self {
        Self {
            core: Arc::new(WriterCore {
                name: subscription.name.clone(),
                db: db.into(),
                rp: rp.into(),
                clients,
                metrics: WriterMetrics::new(),
            }),
            subscription,
            mode,
            fan_out: FanOut::for_mode(mode),
            lifecycle: RwLock::new(Lifecycle::Created),
        }
    }

    /// Create a writer around prebuilt clients (for testing)
    pub fn with_clients(
        db: impl Into<String>,
        rp: impl Into<String>,
        name: impl Into<String>,
        mode: SubscriptionMode,
        clients: Vec<Arc<dyn DestinationClient>>,
    ) -> Self {
        let subscription = SubscriptionInfo::new(
            name,
            mode,
            clients.iter().map(|c| c.destination().to_string()),
        );
        Self::new(db, rp, subscription, mode, clients)
    }

    /// Subscription name
    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn db(&self) -> &str {
        &self.core.db
    }

    pub fn rp(&self) -> &str {
        &self.core.rp
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Subscription definition this writer was built from
    pub fn subscription(&self) -> &SubscriptionInfo {
        &self.subscription
    }

    /// Destination clients, in subscription order
    pub fn clients(&self) -> &[Arc<dyn DestinationClient>] {
        &self.core.clients
    }

    pub fn metrics(&self) -> &WriterMetrics {
        &self.core.metrics
    }

    pub fn state(&self) -> WriterState {
        match &*self.lifecycle.read() {
            Lifecycle::Created => WriterState::Created,
            Lifecycle::Running { .. } => WriterState::Running,
            Lifecycle::Stopped { .. } => WriterState::Stopped,
        }
    }

    /// Requests currently buffered
    pub fn queue_len(&self) -> usize {
        match &*self.lifecycle.read() {
            Lifecycle::Running { tx, .. } => tx.len(),
            _ => 0,
        }
    }

    /// Forward an encoded payload (non-blocking)
    pub fn write(&self, payload: Bytes) -> WriteSummary {
        self.dispatch(|client| WriteRequest::encoded(client, payload.clone()))
    }

    /// Forward a columnar record (non-blocking)
    pub fn write_column(&self, mst: &str, record: &RecordBatch) -> WriteSummary {
        self.dispatch(|client| WriteRequest::columnar(client, mst, record.clone()))
    }

    fn dispatch(&self, mut make: impl FnMut(usize) -> WriteRequest) -> WriteSummary {
        let mut summary = WriteSummary::default();
        let clients = self.core.clients.len();
        if clients == 0 {
            return summary;
        }

        let lifecycle = self.lifecycle.read();
        match &self.fan_out {
            FanOut::Broadcast => {
                for client in 0..clients {
                    summary.record(self.enqueue(&lifecycle, make(client)));
                }
            }
            FanOut::Rotation(cursor) => {
                let client = next_target(cursor, clients);
                summary.record(self.enqueue(&lifecycle, make(client)));
            }
        }
        summary
    }

    fn enqueue(&self, lifecycle: &Lifecycle, request: WriteRequest) -> EnqueueOutcome {
        let core = &self.core;
        let Lifecycle::Running { tx, .. } = lifecycle else {
            core.metrics.inc_rejected_count();
            observability::record_request_rejected(&core.name);
            debug!(sub = %core.name, db = %core.db, rp = %core.rp, "Writer not running, request rejected");
            return EnqueueOutcome::Rejected;
        };

        match tx.try_send(request) {
            Ok(()) => {
                core.metrics.inc_queued_count();
                observability::record_request_queued();
                EnqueueOutcome::Queued
            }
            Err(TrySendError::Full(request)) => {
                core.metrics.inc_dropped_count();
                observability::record_request_dropped(&core.db, &core.rp, &core.name);
                error!(
                    dest = %core.clients[request.client].destination(),
                    db = %core.db,
                    rp = %core.rp,
                    sub = %core.name,
                    "failed to send write request to write buffer"
                );
                EnqueueOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                core.metrics.inc_rejected_count();
                observability::record_request_rejected(&core.name);
                EnqueueOutcome::Rejected
            }
        }
    }

    /// Open the queue and spawn the workers (Created -> Running)
    ///
    /// Returns false, leaving the writer as is, when it was already started.
    #[instrument(
        name = "dispatch_writer_start",
        skip(self),
        fields(sub = %self.core.name, db = %self.core.db, rp = %self.core.rp)
    )]
    pub fn start(&self, concurrency: usize, buffer_size: usize) -> bool {
        let mut lifecycle = self.lifecycle.write();
        if !matches!(*lifecycle, Lifecycle::Created) {
            warn!(sub = %self.core.name, "Writer already started");
            return false;
        }

        let (tx, rx) = async_channel::bounded(buffer_size.max(1));
        let workers = (0..concurrency.max(1))
            .map(|worker| {
                let core = Arc::clone(&self.core);
                let rx = rx.clone();
                tokio::spawn(async move {
                    run_worker(core, rx, worker).await;
                })
            })
            .collect();

        *lifecycle = Lifecycle::Running { tx, workers };
        debug!(
            sub = %self.core.name,
            clients = self.core.clients.len(),
            mode = %self.mode,
            "Writer started"
        );
        true
    }

    /// Close the queue (-> Stopped)
    ///
    /// Workers finish what is already buffered, then exit. Returns false if
    /// the writer was already stopped.
    pub fn stop(&self) -> bool {
        let mut lifecycle = self.lifecycle.write();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped { workers: Vec::new() }) {
            Lifecycle::Running { tx, workers } => {
                tx.close();
                *lifecycle = Lifecycle::Stopped { workers };
                info!(sub = %self.core.name, db = %self.core.db, rp = %self.core.rp, "Writer stopped");
                true
            }
            Lifecycle::Created => true,
            stopped @ Lifecycle::Stopped { .. } => {
                *lifecycle = stopped;
                false
            }
        }
    }

    /// Wait for the workers of a stopped writer to drain and exit
    pub async fn join(&self) {
        let workers = {
            let mut lifecycle = self.lifecycle.write();
            match &mut *lifecycle {
                Lifecycle::Stopped { workers } => std::mem::take(workers),
                _ => return,
            }
        };

        for worker in workers {
            if let Err(e) = worker.await {
                error!(sub = %self.core.name, error = ?e, "Worker task panicked");
            }
        }
    }

    /// Stop and wait for the drain
    pub async fn shutdown(&self) {
        self.stop();
        self.join().await;
    }
}

/// Worker task: pull requests until the queue is closed and empty
async fn run_worker(core: Arc<WriterCore>, rx: Receiver<WriteRequest>, worker: usize) {
    debug!(sub = %core.name, worker, "Writer worker started");

    while let Ok(request) = rx.recv().await {
        let Some(client) = core.clients.get(request.client) else {
            continue;
        };

        let started = Instant::now();
        let result = match &request.payload {
            Payload::Encoded(payload) => client.send(&core.db, &core.rp, payload.clone()).await,
            Payload::Columnar { mst, record } => {
                client.send_column(&core.db, &core.rp, mst, record).await
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => {
                core.metrics.inc_delivered_count();
                observability::record_delivery(client.destination(), true, latency_ms);
            }
            Err(e) => {
                core.metrics.inc_failure_count();
                observability::record_delivery(client.destination(), false, latency_ms);
                error!(
                    dest = %client.destination(),
                    db = %core.db,
                    rp = %core.rp,
                    error = %e,
                    "failed to forward write request"
                );
                // No retry, keep draining
            }
        }
    }

    debug!(sub = %core.name, worker, "Writer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{ArrayRef, Float64Array};
    use async_trait::async_trait;
    use contracts::{Capability, ContractError};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::{Notify, Semaphore};

    /// Records every send into a shared log
    struct MockClient {
        destination: String,
        log: Arc<Mutex<Vec<(String, Bytes)>>>,
        columns: Arc<AtomicU64>,
        should_fail: bool,
        gate: Option<(Arc<Semaphore>, Arc<Notify>)>,
    }

    impl MockClient {
        fn new(destination: &str, log: &Arc<Mutex<Vec<(String, Bytes)>>>) -> Self {
            Self {
                destination: destination.to_string(),
                log: Arc::clone(log),
                columns: Arc::new(AtomicU64::new(0)),
                should_fail: false,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl DestinationClient for MockClient {
        async fn send(&self, _db: &str, _rp: &str, payload: Bytes) -> Result<(), ContractError> {
            if let Some((gate, entered)) = &self.gate {
                entered.notify_one();
                gate.acquire().await.unwrap().forget();
            }
            self.log.lock().push((self.destination.clone(), payload));
            if self.should_fail {
                return Err(ContractError::transport(&self.destination, "mock failure"));
            }
            Ok(())
        }

        async fn send_column(
            &self,
            _db: &str,
            _rp: &str,
            _mst: &str,
            _record: &RecordBatch,
        ) -> Result<(), ContractError> {
            self.columns.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn destination(&self) -> &str {
            &self.destination
        }

        fn capability(&self) -> Capability {
            Capability::EncodedPayload
        }
    }

    fn mock_clients(
        count: usize,
        log: &Arc<Mutex<Vec<(String, Bytes)>>>,
    ) -> Vec<Arc<dyn DestinationClient>> {
        (0..count)
            .map(|i| Arc::new(MockClient::new(&format!("mock://{i}"), log)) as Arc<dyn DestinationClient>)
            .collect()
    }

    fn destinations(log: &Arc<Mutex<Vec<(String, Bytes)>>>) -> Vec<String> {
        log.lock().iter().map(|(dest, _)| dest.clone()).collect()
    }

    #[tokio::test]
    async fn test_broadcast_enqueues_one_request_per_client() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer =
            DispatchWriter::with_clients("db", "rp", "sub", SubscriptionMode::All, mock_clients(3, &log));
        writer.start(2, 16);

        let summary = writer.write(Bytes::from_static(b"cpu value=1"));
        assert_eq!(summary, WriteSummary { queued: 3, dropped: 0, rejected: 0 });

        writer.shutdown().await;

        let mut sent = destinations(&log);
        sent.sort();
        assert_eq!(sent, vec!["mock://0", "mock://1", "mock://2"]);
        assert!(log.lock().iter().all(|(_, payload)| payload.as_ref() == b"cpu value=1"));
        assert_eq!(writer.metrics().delivered_count(), 3);
    }

    #[tokio::test]
    async fn test_rotation_cycles_through_clients() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer =
            DispatchWriter::with_clients("db", "rp", "sub", SubscriptionMode::Any, mock_clients(3, &log));
        // Single worker keeps queue order
        writer.start(1, 16);

        for _ in 0..7 {
            let summary = writer.write(Bytes::from_static(b"m v=1"));
            assert_eq!(summary.queued, 1);
        }
        writer.shutdown().await;

        assert_eq!(
            destinations(&log),
            vec!["mock://0", "mock://1", "mock://2", "mock://0", "mock://1", "mock://2", "mock://0"]
        );
    }

    #[test]
    fn test_next_target_wraps() {
        let cursor = Mutex::new(0);
        let targets: Vec<_> = (0..5).map(|_| next_target(&cursor, 2)).collect();
        assert_eq!(targets, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_debug_names_the_subscription() {
        let writer = DispatchWriter::with_clients("db", "rp", "sub", SubscriptionMode::Any, Vec::new());
        let debug = format!("{writer:?}");
        assert!(debug.starts_with("DispatchWriter"));
        assert!(debug.contains("\"sub\""));
        assert!(debug.contains("Created"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Semaphore::new(0));
        let entered = Arc::new(Notify::new());
        let mut client = MockClient::new("mock://slow", &log);
        client.gate = Some((Arc::clone(&gate), Arc::clone(&entered)));

        let capacity = 4;
        let writer = DispatchWriter::with_clients(
            "db",
            "rp",
            "sub",
            SubscriptionMode::All,
            vec![Arc::new(client) as Arc<dyn DestinationClient>],
        );
        writer.start(1, capacity);

        // First request occupies the only worker
        assert_eq!(writer.write(Bytes::from_static(b"first")).queued, 1);
        entered.notified().await;

        let mut total = WriteSummary::default();
        for _ in 0..capacity + 1 {
            total.merge(writer.write(Bytes::from_static(b"m v=1")));
        }
        assert_eq!(total.queued, capacity);
        assert_eq!(total.dropped, 1);
        assert_eq!(writer.metrics().dropped_count(), 1);
        assert_eq!(writer.queue_len(), capacity);

        gate.add_permits(capacity + 1);
        writer.shutdown().await;
        assert_eq!(log.lock().len(), capacity + 1);
    }

    #[tokio::test]
    async fn test_stop_then_write_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer =
            DispatchWriter::with_clients("db", "rp", "sub", SubscriptionMode::All, mock_clients(2, &log));
        writer.start(1, 8);

        assert!(writer.stop());
        assert!(!writer.stop());
        assert_eq!(writer.state(), WriterState::Stopped);

        let summary = writer.write(Bytes::from_static(b"late"));
        assert_eq!(summary, WriteSummary { queued: 0, dropped: 0, rejected: 2 });

        writer.join().await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_write_before_start_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer =
            DispatchWriter::with_clients("db", "rp", "sub", SubscriptionMode::Any, mock_clients(1, &log));
        assert_eq!(writer.state(), WriterState::Created);
        assert_eq!(writer.write(Bytes::from_static(b"early")).rejected, 1);
        assert_eq!(writer.metrics().rejected_count(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_ignored() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer =
            DispatchWriter::with_clients("db", "rp", "sub", SubscriptionMode::All, mock_clients(1, &log));
        assert!(writer.start(1, 4));
        assert!(!writer.start(4, 64));
        writer.shutdown().await;
        assert!(!writer.start(1, 4));
        assert_eq!(writer.state(), WriterState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_drains_buffered_requests() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let writer =
            DispatchWriter::with_clients("db", "rp", "sub", SubscriptionMode::All, mock_clients(1, &log));
        writer.start(1, 32);
        for _ in 0..10 {
            writer.write(Bytes::from_static(b"m v=1"));
        }
        writer.stop();
        writer.join().await;
        assert_eq!(log.lock().len(), 10);
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = MockClient::new("mock://failing", &log);
        failing.should_fail = true;
        let healthy = MockClient::new("mock://healthy", &log);

        let writer = DispatchWriter::with_clients(
            "db",
            "rp",
            "sub",
            SubscriptionMode::All,
            vec![
                Arc::new(failing) as Arc<dyn DestinationClient>,
                Arc::new(healthy) as Arc<dyn DestinationClient>,
            ],
        );
        writer.start(2, 8);
        for _ in 0..3 {
            writer.write(Bytes::from_static(b"m v=1"));
        }
        writer.shutdown().await;

        let snapshot = writer.metrics().snapshot();
        assert_eq!(snapshot.failure_count, 3);
        assert_eq!(snapshot.delivered_count, 3);
        assert_eq!(log.lock().len(), 6);
    }

    #[tokio::test]
    async fn test_write_column_uses_send_column() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let client = MockClient::new("mock://column", &log);
        let columns = Arc::clone(&client.columns);
        let writer = DispatchWriter::with_clients(
            "db",
            "rp",
            "sub",
            SubscriptionMode::Any,
            vec![Arc::new(client) as Arc<dyn DestinationClient>],
        );
        writer.start(1, 8);

        let value: ArrayRef = Arc::new(Float64Array::from(vec![0.5, 0.7]));
        let record = RecordBatch::try_from_iter([("usage", value)]).unwrap();
        assert_eq!(writer.write_column("cpu", &record).queued, 1);

        writer.shutdown().await;
        assert_eq!(columns.load(Ordering::Relaxed), 1);
        assert!(log.lock().is_empty());
    }
}
