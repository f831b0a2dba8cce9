//! Semantic deduplication of candidate nodes.
//!
//! Every candidate is compared against the existing nodes of its
//! `(brand_id, node_type)` partition: an exact text hash hit or a cosine
//! similarity at or above the threshold merges the candidate into the best
//! existing match (append source, raise confidence to the max) instead of
//! inserting a new node. This is what keeps repeated, slightly reworded
//! extractions across documents from fragmenting the graph.
//!
//! Writes for one partition are serialized through a keyed async mutex held
//! across the scan+insert critical section — the similarity scan alone is
//! advisory under concurrency, two unserialized candidates could both miss
//! each other and insert twice.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use brandgraph_core::{
    CreateNodeRequest, EmbeddingBackend, Error, KnowledgeNode, NodeEmbeddingRepository,
    NodeRepository, NodeType, Result, Vector,
};
use brandgraph_db::hash_text;

use crate::similarity::cosine_similarity;

/// Behavior when the embedding gateway is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupFailurePolicy {
    /// Reject the candidate with a transient error; the caller retries
    /// later. Trades availability for duplicate-avoidance.
    #[default]
    FailClosed,
    /// Skip the similarity scan and insert the candidate without an
    /// embedding. The node is invisible to later scans until re-embedded.
    FailOpen,
}

/// Deduplication configuration.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Minimum cosine similarity treated as "same underlying insight".
    pub similarity_threshold: f32,
    pub failure_policy: DedupFailurePolicy,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: brandgraph_core::defaults::DEDUP_SIMILARITY_THRESHOLD,
            failure_policy: DedupFailurePolicy::FailClosed,
        }
    }
}

impl DedupConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BRANDGRAPH_DEDUP_THRESHOLD` | `0.65` | Similarity threshold |
    /// | `BRANDGRAPH_DEDUP_FAIL_OPEN` | `false` | Insert on gateway failure |
    pub fn from_env() -> Self {
        let similarity_threshold = std::env::var("BRANDGRAPH_DEDUP_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|v| (0.0..=1.0).contains(v))
            .unwrap_or(brandgraph_core::defaults::DEDUP_SIMILARITY_THRESHOLD);

        let failure_policy = match std::env::var("BRANDGRAPH_DEDUP_FAIL_OPEN").as_deref() {
            Ok("true") | Ok("1") => DedupFailurePolicy::FailOpen,
            _ => DedupFailurePolicy::FailClosed,
        };

        Self {
            similarity_threshold,
            failure_policy,
        }
    }
}

/// Result of submitting one candidate.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub node: KnowledgeNode,
    pub is_new: bool,
}

/// Deduplicating write path for knowledge nodes.
pub struct DedupService {
    nodes: Arc<dyn NodeRepository>,
    embeddings: Arc<dyn NodeEmbeddingRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    config: DedupConfig,
    partition_locks: Mutex<HashMap<(i64, NodeType), Arc<Mutex<()>>>>,
}

impl DedupService {
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        embeddings: Arc<dyn NodeEmbeddingRepository>,
        embedder: Arc<dyn EmbeddingBackend>,
        config: DedupConfig,
    ) -> Self {
        Self {
            nodes,
            embeddings,
            embedder,
            config,
            partition_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Find a near-duplicate of the candidate or create a new node.
    ///
    /// Submitting the same `(node_type, text)` twice for one brand yields
    /// exactly one stored node; the second call merges and reports
    /// `is_new = false`.
    pub async fn find_or_create(&self, req: CreateNodeRequest) -> Result<DedupOutcome> {
        req.validate()?;

        let lock = self.partition_lock(req.brand_id, req.node_type).await;
        let _guard = lock.lock().await;

        // Exact-text short-circuit: no embedding call needed.
        let text_hash = hash_text(&req.text);
        if let Some(existing) = self
            .nodes
            .find_by_text_hash(req.brand_id, req.node_type, &text_hash)
            .await?
        {
            debug!(
                brand_id = req.brand_id,
                node_id = %existing.id,
                "Exact-text duplicate, merging"
            );
            return self.merge(existing.id, &req).await;
        }

        let vector = match self.embedder.embed(&req.text).await {
            Ok(vector) => Some(vector),
            Err(e) => match self.config.failure_policy {
                DedupFailurePolicy::FailClosed => {
                    warn!(
                        brand_id = req.brand_id,
                        error = %e,
                        "Embedding gateway failed, rejecting candidate (fail-closed)"
                    );
                    return Err(e);
                }
                DedupFailurePolicy::FailOpen => {
                    warn!(
                        brand_id = req.brand_id,
                        error = %e,
                        "Embedding gateway failed, inserting without dedup (fail-open)"
                    );
                    None
                }
            },
        };

        if let Some(vector) = &vector {
            if let Some((node_id, similarity)) =
                self.best_match(req.brand_id, req.node_type, vector).await?
            {
                debug!(
                    brand_id = req.brand_id,
                    node_id = %node_id,
                    similarity,
                    "Near-duplicate above threshold, merging"
                );
                return self.merge(node_id, &req).await;
            }
        }

        let node = self.nodes.create(req).await?;
        if let Some(vector) = &vector {
            self.embeddings
                .store(
                    node.id,
                    node.brand_id,
                    node.node_type,
                    vector,
                    self.embedder.model_name(),
                )
                .await?;
        }
        Ok(DedupOutcome { node, is_new: true })
    }

    /// Best existing node at or above the similarity threshold.
    ///
    /// Ties on similarity break toward the earliest-created node.
    async fn best_match(
        &self,
        brand_id: i64,
        node_type: NodeType,
        vector: &Vector,
    ) -> Result<Option<(Uuid, f32)>> {
        let stored = self.embeddings.for_brand_type(brand_id, node_type).await?;
        if stored.is_empty() {
            return Ok(None);
        }

        let candidate = vector.as_slice();
        let qualifying: Vec<(f32, Uuid)> = stored
            .iter()
            .filter_map(|(node_id, existing)| {
                let similarity = cosine_similarity(candidate, existing.as_slice());
                (similarity >= self.config.similarity_threshold).then_some((similarity, *node_id))
            })
            .collect();
        if qualifying.is_empty() {
            return Ok(None);
        }

        let best_similarity = qualifying
            .iter()
            .map(|(s, _)| *s)
            .fold(f32::NEG_INFINITY, f32::max);
        let tied: Vec<Uuid> = qualifying
            .iter()
            .filter(|(s, _)| *s == best_similarity)
            .map(|(_, node_id)| *node_id)
            .collect();

        if tied.len() == 1 {
            return Ok(Some((tied[0], best_similarity)));
        }

        // Tie-break by earliest created_at (then id, for same-millisecond).
        let mut earliest: Option<KnowledgeNode> = None;
        for node_id in tied {
            let node = self.nodes.get(node_id).await?;
            earliest = match earliest {
                None => Some(node),
                Some(current)
                    if (node.created_at, node.id) < (current.created_at, current.id) =>
                {
                    Some(node)
                }
                Some(current) => Some(current),
            };
        }
        Ok(earliest.map(|n| (n.id, best_similarity)))
    }

    async fn merge(&self, node_id: Uuid, req: &CreateNodeRequest) -> Result<DedupOutcome> {
        self.nodes.append_source(node_id, req.source.clone()).await?;
        self.nodes.merge_confidence(node_id, req.confidence).await?;
        let node = self.nodes.get(node_id).await?;
        Ok(DedupOutcome {
            node,
            is_new: false,
        })
    }

    async fn partition_lock(&self, brand_id: i64, node_type: NodeType) -> Arc<Mutex<()>> {
        let mut locks = self.partition_locks.lock().await;
        locks
            .entry((brand_id, node_type))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
