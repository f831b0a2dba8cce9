//! Centralized default constants for brandgraph.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// DEDUPLICATION
// =============================================================================

/// Minimum cosine similarity at which two candidate texts are treated as the
/// same underlying insight.
pub const DEDUP_SIMILARITY_THRESHOLD: f32 = 0.65;

/// Maximum characters of a derived node summary.
pub const SUMMARY_MAX_CHARS: usize = 120;

// =============================================================================
// RELATIONSHIP INFERENCE
// =============================================================================

/// Minimum proposal strength at which an inferred relation is persisted.
/// Proposals below the floor would flood the graph with weak edges.
pub const RELATION_ACCEPTANCE_FLOOR: f32 = 0.3;

/// Maximum relations retained per newly created node during inference.
pub const RELATION_FAN_OUT_CAP: usize = 10;

/// Concurrent pair-inference calls per batch.
pub const MAX_CONCURRENT_PAIR_INFERENCE: usize = 4;

// =============================================================================
// INGESTION
// =============================================================================

/// Concurrent document batches processed by the ingest worker.
pub const MAX_CONCURRENT_BATCHES: usize = 4;

/// Submission queue depth for the ingest worker.
pub const INGEST_QUEUE_CAPACITY: usize = 64;

/// Broadcast channel capacity for pipeline events.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// TRAVERSAL
// =============================================================================

/// Default hop budget for multi-hop traversal.
pub const MULTI_HOP_DEFAULT_MAX_HOPS: usize = 3;

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;
