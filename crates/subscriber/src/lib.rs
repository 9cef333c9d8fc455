//! # Subscriber
//!
//! Keeps one DispatchWriter per subscription in line with the metadata
//! service and routes every ingested write to the writers of its
//! (database, retention policy).

pub mod manager;
pub mod memory;
mod update;

pub use manager::{ReconcileReport, SubscriberManager, WriterKey, WriterStatus};
pub use memory::MemoryMetaClient;
