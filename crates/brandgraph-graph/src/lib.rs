//! # brandgraph-graph
//!
//! The knowledge graph engine for brandgraph:
//! - Semantic deduplication of candidate nodes (embedding similarity with a
//!   keyed write-serialization point)
//! - Relationship inference over new-node batches (compatibility table,
//!   acceptance floor, fan-out cap)
//! - The human verification lifecycle
//! - Read-only graph queries: export, multi-hop traversal, gap analysis,
//!   contradiction scan

pub mod compat;
pub mod dedup;
pub mod infer;
pub mod query;
pub mod similarity;
pub mod snapshot;
pub mod verify;

// Re-export core types
pub use brandgraph_core::*;

pub use compat::{eligible_relations, is_eligible};
pub use dedup::{DedupConfig, DedupFailurePolicy, DedupOutcome, DedupService};
pub use infer::{InferenceEngineConfig, RelationInferenceEngine};
pub use query::{
    CoverageRules, Direction, GraphExport, GraphQueryEngine, GraphStats, MultiHopPaths,
    TraversalPath,
};
pub use similarity::cosine_similarity;
pub use snapshot::{EdgeRef, GraphSnapshot};
pub use verify::VerificationService;
