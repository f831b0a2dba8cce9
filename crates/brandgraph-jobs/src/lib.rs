//! # brandgraph-jobs
//!
//! Batch ingestion for brandgraph.
//!
//! This crate provides:
//! - [`IngestPipeline`]: one document's extraction → dedup → relationship
//!   inference batch, with rollback when the source document is deleted
//!   mid-flight
//! - [`IngestWorker`]: bounded-concurrency processing of submitted
//!   documents with progress events over a broadcast channel
//!
//! ## Example
//!
//! ```ignore
//! use brandgraph_jobs::{IngestWorker, WorkerConfig};
//!
//! let worker = IngestWorker::new(pipeline, WorkerConfig::from_env());
//! let handle = worker.start();
//!
//! handle.submit(document).await?;
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod pipeline;
pub mod worker;

// Re-export core types
pub use brandgraph_core::*;

pub use pipeline::IngestPipeline;
pub use worker::{IngestWorker, WorkerConfig, WorkerEvent, WorkerHandle};
