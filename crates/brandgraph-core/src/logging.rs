//! Structured logging schema and field name constants for brandgraph.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (pairs, candidates) |

use tracing_subscriber::EnvFilter;

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "inference", "graph", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "find_or_create", "infer_batch", "multi_hop", "ingest"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Brand scope of the operation.
pub const BRAND_ID: &str = "brand_id";

/// Node UUID being operated on.
pub const NODE_ID: &str = "node_id";

/// Relation UUID being operated on.
pub const RELATION_ID: &str = "relation_id";

/// Source document UUID for an ingestion batch.
pub const DOCUMENT_ID: &str = "document_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of candidates processed in a batch.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of eligible node pairs scanned by inference.
pub const PAIR_COUNT: &str = "pair_count";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Best cosine similarity observed by a dedup scan.
pub const SIMILARITY: &str = "similarity";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Initialize the process-wide tracing subscriber.
///
/// Filter resolution: `RUST_LOG` env var when set, otherwise
/// `default_filter`. Safe to call once at process start; later calls are
/// no-ops.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("info");
        init("debug");
    }

    #[test]
    fn test_field_names_are_snake_case() {
        for name in [
            SUBSYSTEM, OPERATION, BRAND_ID, NODE_ID, RELATION_ID, DOCUMENT_ID, DURATION_MS,
            CANDIDATE_COUNT, PAIR_COUNT, RESULT_COUNT, MODEL, SIMILARITY, SUCCESS, ERROR_MSG,
        ] {
            assert!(!name.is_empty());
            assert_eq!(name, name.to_lowercase());
            assert!(!name.contains(' '));
        }
    }
}
