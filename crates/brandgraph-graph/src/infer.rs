//! Relationship inference over a freshly committed batch of nodes.
//!
//! For every ordered pair (new node, any existing same-brand node —
//! including the batch's other new nodes) whose types are eligible per the
//! compatibility table, the inference collaborator is asked once for a
//! verdict. Accepted proposals must clear the strength floor; the per-node
//! fan-out cap then keeps only the strongest edges, which bounds graph
//! density no matter how chatty the collaborator is.
//!
//! The engine must run only after the whole document's candidates are
//! durably committed — the pair scan needs the complete node set. The
//! ingestion pipeline owns that ordering.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use brandgraph_core::{
    CreateRelationRequest, Error, KnowledgeNode, KnowledgeRelation, ListNodesRequest,
    NodeRepository, Provenance, RelationInferenceBackend, RelationProposal, RelationRepository,
    Result,
};

use crate::compat::eligible_relations;

/// Relationship inference configuration.
#[derive(Debug, Clone)]
pub struct InferenceEngineConfig {
    /// Minimum proposal strength persisted as a relation.
    pub acceptance_floor: f32,
    /// Maximum relations retained per new node; strongest win.
    pub fan_out_cap: usize,
    /// Concurrent pair-inference calls.
    pub max_concurrent_pairs: usize,
}

impl Default for InferenceEngineConfig {
    fn default() -> Self {
        Self {
            acceptance_floor: brandgraph_core::defaults::RELATION_ACCEPTANCE_FLOOR,
            fan_out_cap: brandgraph_core::defaults::RELATION_FAN_OUT_CAP,
            max_concurrent_pairs: brandgraph_core::defaults::MAX_CONCURRENT_PAIR_INFERENCE,
        }
    }
}

impl InferenceEngineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BRANDGRAPH_RELATION_FLOOR` | `0.3` | Acceptance floor |
    /// | `BRANDGRAPH_RELATION_FAN_OUT` | `10` | Per-node fan-out cap |
    /// | `BRANDGRAPH_RELATION_CONCURRENCY` | `4` | Concurrent pair calls |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            acceptance_floor: std::env::var("BRANDGRAPH_RELATION_FLOOR")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|v| (0.0..=1.0).contains(v))
                .unwrap_or(defaults.acceptance_floor),
            fan_out_cap: std::env::var("BRANDGRAPH_RELATION_FAN_OUT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.fan_out_cap),
            max_concurrent_pairs: std::env::var("BRANDGRAPH_RELATION_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_concurrent_pairs),
        }
    }
}

/// Proposes and commits relations for a batch of newly added nodes.
pub struct RelationInferenceEngine {
    nodes: Arc<dyn NodeRepository>,
    relations: Arc<dyn RelationRepository>,
    backend: Arc<dyn RelationInferenceBackend>,
    config: InferenceEngineConfig,
}

impl RelationInferenceEngine {
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        relations: Arc<dyn RelationRepository>,
        backend: Arc<dyn RelationInferenceBackend>,
        config: InferenceEngineConfig,
    ) -> Self {
        Self {
            nodes,
            relations,
            backend,
            config,
        }
    }

    /// Infer and persist relations for one batch of new nodes.
    ///
    /// Pair-level collaborator failures skip that pair and continue; a
    /// deleted endpoint skips its relation. Returns the committed relations.
    pub async fn infer_for_batch(
        &self,
        brand_id: i64,
        new_node_ids: &[Uuid],
    ) -> Result<Vec<KnowledgeRelation>> {
        if new_node_ids.is_empty() {
            return Ok(Vec::new());
        }

        let all = self.nodes.list(ListNodesRequest::for_brand(brand_id)).await?;
        let new_set: HashSet<Uuid> = new_node_ids.iter().copied().collect();

        // Eligible ordered pairs with a new node on the `from` side. Pairs
        // of two new nodes appear in both orders, once per direction. Store
        // index pairs rather than borrowed references so the per-pair future
        // stream does not carry two entangled node lifetimes through the map
        // closure (which defeats higher-ranked inference once the batch
        // future is spawned onto a `Send` task).
        let mut pairs: Vec<(usize, usize, Vec<brandgraph_core::RelationType>)> = Vec::new();
        for (from_idx, from) in all.iter().enumerate() {
            if !new_set.contains(&from.id) {
                continue;
            }
            for (to_idx, to) in all.iter().enumerate() {
                if to.id == from.id {
                    continue;
                }
                let eligible = eligible_relations(from.node_type, to.node_type);
                if !eligible.is_empty() {
                    pairs.push((from_idx, to_idx, eligible.to_vec()));
                }
            }
        }

        debug!(
            brand_id,
            pair_count = pairs.len(),
            new_nodes = new_node_ids.len(),
            "Scanning eligible pairs"
        );

        let backend = &self.backend;
        let all_ref = &all;
        let verdicts: Vec<Option<(Uuid, Uuid, RelationProposal)>> = stream::iter(
            pairs.into_iter().map(|(from_idx, to_idx, eligible)| async move {
                infer_pair(
                    backend.as_ref(),
                    &all_ref[from_idx],
                    &all_ref[to_idx],
                    &eligible,
                )
                .await
            }),
        )
        .buffer_unordered(self.config.max_concurrent_pairs)
        .collect()
        .await;

        // Group accepted proposals by source node.
        let mut per_node: HashMap<Uuid, Vec<(Uuid, RelationProposal)>> = HashMap::new();
        for (from_id, to_id, proposal) in verdicts.into_iter().flatten() {
            if proposal.strength < self.config.acceptance_floor {
                continue;
            }
            per_node.entry(from_id).or_default().push((to_id, proposal));
        }

        // Apply the fan-out cap: strongest proposals win, ties break on
        // target id for determinism.
        let mut committed = Vec::new();
        for from_id in new_node_ids {
            let Some(mut proposals) = per_node.remove(from_id) else {
                continue;
            };
            proposals.sort_by(|(a_id, a), (b_id, b)| {
                b.strength
                    .partial_cmp(&a.strength)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a_id.cmp(b_id))
            });
            if proposals.len() > self.config.fan_out_cap {
                debug!(
                    node_id = %from_id,
                    dropped = proposals.len() - self.config.fan_out_cap,
                    "Fan-out cap exceeded, dropping weakest proposals"
                );
                proposals.truncate(self.config.fan_out_cap);
            }

            for (to_id, proposal) in proposals {
                let req = CreateRelationRequest {
                    brand_id,
                    from_node_id: *from_id,
                    to_node_id: to_id,
                    relation_type: proposal.relation_type,
                    strength: proposal.strength,
                    context: proposal.context,
                    inferred_by: Provenance::Llm,
                };
                match self.relations.create(req).await {
                    Ok(relation) => committed.push(relation),
                    // An endpoint deleted mid-batch loses its relation, the
                    // rest of the batch continues.
                    Err(Error::NodeNotFound(id)) => {
                        warn!(node_id = %id, "Endpoint vanished mid-batch, skipping relation");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(
            brand_id,
            result_count = committed.len(),
            "Relationship inference batch complete"
        );
        Ok(committed)
    }
}

/// Ask the backend about a single eligible pair. Extracted into a named
/// `async fn` so the compiler infers a higher-ranked signature over the
/// borrowed node references; an inline async closure fails that inference
/// when the batch future is later spawned onto a `Send` task.
async fn infer_pair(
    backend: &dyn RelationInferenceBackend,
    from: &KnowledgeNode,
    to: &KnowledgeNode,
    eligible: &[brandgraph_core::RelationType],
) -> Option<(Uuid, Uuid, RelationProposal)> {
    match backend.infer(from, to, eligible).await {
        Ok(Some(proposal)) => Some((from.id, to.id, proposal)),
        Ok(None) => None,
        Err(e) => {
            warn!(
                from_node = %from.id,
                to_node = %to.id,
                error = %e,
                "Pair inference failed, skipping pair"
            );
            None
        }
    }
}
