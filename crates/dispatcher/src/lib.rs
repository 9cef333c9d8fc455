//! # Dispatcher
//!
//! Write forwarding for a single subscription.
//!
//! Responsible for:
//! - Building destination clients from subscription URIs
//! - Fan-out (broadcast or rotation) into a bounded queue
//! - Draining the queue with a worker pool, isolating slow destinations

pub mod builder;
pub mod clients;
pub mod error;
pub mod metrics;
pub mod writer;

pub use builder::{create_writer, WriterBuilder};
pub use clients::{FlightClient, HttpClient, Transport};
pub use contracts::{DestinationClient, SubscriptionMode, WriteRequest};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, WriterMetrics};
pub use writer::{DispatchWriter, EnqueueOutcome, WriteSummary, WriterState};
