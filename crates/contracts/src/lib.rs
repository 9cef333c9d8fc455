//! # Contracts
//!
//! Frozen interface contracts shared by the subscriber crates: the metadata
//! catalog, the destination client trait, write requests, configuration
//! and the error taxonomy.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.

mod catalog;
mod client;
mod config;
mod error;
mod request;

pub use catalog::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use request::*;

pub use arrow_array::RecordBatch;
pub use bytes::Bytes;
