//! Ingest worker: bounded-concurrency processing of submitted documents.
//!
//! Batches for different documents run concurrently up to a fixed pool
//! size (external API rate limits are the binding constraint, not CPU);
//! within one batch the pipeline owns ordering. Workers receive
//! fully-materialized [`DocumentInput`] values over a channel — never live
//! handles into a store — and report outcomes as broadcast events.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use brandgraph_core::{DocumentInput, Error, IngestReport, Result};

use crate::pipeline::IngestPipeline;

/// Configuration for the ingest worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent document batches.
    pub max_concurrent_batches: usize,
    /// Submission queue depth.
    pub queue_capacity: usize,
    /// Whether to process submissions at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_batches: brandgraph_core::defaults::MAX_CONCURRENT_BATCHES,
            queue_capacity: brandgraph_core::defaults::INGEST_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BRANDGRAPH_INGEST_ENABLED` | `true` | Enable/disable processing |
    /// | `BRANDGRAPH_MAX_CONCURRENT_BATCHES` | `4` | Concurrent batches |
    pub fn from_env() -> Self {
        let enabled = std::env::var("BRANDGRAPH_INGEST_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_batches = std::env::var("BRANDGRAPH_MAX_CONCURRENT_BATCHES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(brandgraph_core::defaults::MAX_CONCURRENT_BATCHES)
            .max(1);

        Self {
            max_concurrent_batches,
            enabled,
            ..Default::default()
        }
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_batches = max.max(1);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the ingest worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A document batch started processing.
    BatchStarted { document_id: Uuid, brand_id: i64 },
    /// A batch completed successfully.
    BatchCompleted {
        document_id: Uuid,
        report: IngestReport,
    },
    /// A batch was discarded because its document was deleted in flight.
    BatchCancelled { document_id: Uuid },
    /// A batch failed.
    BatchFailed { document_id: Uuid, error: String },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    submit_tx: mpsc::Sender<DocumentInput>,
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Queue a document for ingestion.
    pub async fn submit(&self, document: DocumentInput) -> Result<()> {
        self.submit_tx
            .send(document)
            .await
            .map_err(|_| Error::Internal("Ingest worker is not accepting submissions".into()))
    }

    /// Signal the worker to shut down gracefully. In-flight batches finish.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Worker that processes submitted documents through the ingest pipeline.
pub struct IngestWorker {
    pipeline: Arc<IngestPipeline>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl IngestWorker {
    pub fn new(pipeline: Arc<IngestPipeline>, config: WorkerConfig) -> Self {
        let (event_tx, _) =
            broadcast::channel(brandgraph_core::defaults::EVENT_BUS_CAPACITY);
        Self {
            pipeline,
            config,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (submit_tx, submit_rx) = mpsc::channel(self.config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(self.run(submit_rx, shutdown_rx));

        WorkerHandle {
            submit_tx,
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(
        self,
        mut submit_rx: mpsc::Receiver<DocumentInput>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        if !self.config.enabled {
            info!("Ingest worker is disabled, not starting");
            return;
        }

        info!(
            max_concurrent = self.config.max_concurrent_batches,
            "Ingest worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches));
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Ingest worker received shutdown signal");
                    break;
                }
                document = submit_rx.recv() => {
                    let Some(document) = document else { break };
                    let Ok(permit) = semaphore.clone().acquire_owned().await else { break };
                    let pipeline = self.pipeline.clone();
                    let event_tx = self.event_tx.clone();
                    tasks.spawn(async move {
                        let document_id = document.document_id;
                        let _ = event_tx.send(WorkerEvent::BatchStarted {
                            document_id,
                            brand_id: document.brand_id,
                        });

                        match pipeline.ingest_document(document).await {
                            Ok(report) => {
                                let _ = event_tx.send(WorkerEvent::BatchCompleted {
                                    document_id,
                                    report,
                                });
                            }
                            Err(Error::BatchCancelled(_)) => {
                                warn!(document_id = %document_id, "Batch cancelled");
                                let _ = event_tx.send(WorkerEvent::BatchCancelled { document_id });
                            }
                            Err(e) => {
                                error!(document_id = %document_id, error = %e, "Batch failed");
                                let _ = event_tx.send(WorkerEvent::BatchFailed {
                                    document_id,
                                    error: e.to_string(),
                                });
                            }
                        }
                        drop(permit);
                    });
                }
            }
        }

        // Let in-flight batches finish before reporting the stop.
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Batch task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Ingest worker stopped");
    }
}
