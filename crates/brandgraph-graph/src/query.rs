//! Graph query engine: export, multi-hop traversal, gap analysis, and
//! contradiction scan.
//!
//! All operations are read-only over a [`GraphSnapshot`] loaded per call —
//! no hidden state survives between calls, so every traversal is
//! restartable by construction. Failure semantics are limited to "not
//! found" for an unknown start node; unknown brands yield empty results.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use brandgraph_core::{
    KnowledgeNode, KnowledgeRelation, ListNodesRequest, ListRelationsRequest, NodeRepository,
    NodeType, RelationRepository, RelationType, Result,
};

use crate::snapshot::GraphSnapshot;

/// Which edge directions a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Aggregate stats included in a full export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub relation_count: usize,
    pub nodes_by_type: BTreeMap<NodeType, i64>,
    pub relations_by_type: BTreeMap<RelationType, i64>,
    /// Count of `contradicts`-typed edges, surfaced separately because they
    /// are the graph's high-priority review items.
    pub contradiction_count: i64,
}

/// Full graph dump for visualization and downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeRelation>,
    pub stats: GraphStats,
}

/// Which node types need coverage and which relation types provide it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRules {
    pub needs_coverage: Vec<NodeType>,
    pub covering: Vec<RelationType>,
}

impl Default for CoverageRules {
    fn default() -> Self {
        Self {
            needs_coverage: vec![NodeType::PatientTension, NodeType::UnmetNeed],
            covering: vec![RelationType::Addresses, RelationType::Supports],
        }
    }
}

/// One traversal path: `nodes` has exactly one more entry than `relations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalPath {
    pub nodes: Vec<Uuid>,
    pub relations: Vec<Uuid>,
}

impl TraversalPath {
    pub fn hops(&self) -> usize {
        self.relations.len()
    }
}

struct PathState {
    node: usize,
    node_path: Vec<usize>,
    edge_path: Vec<usize>,
    visited: HashSet<usize>,
}

/// Lazy breadth-first sequence of paths out of a start node.
///
/// Owns its snapshot and frontier; dropping it mid-iteration costs
/// nothing, and a fresh `multi_hop` call re-walks from scratch.
pub struct MultiHopPaths {
    snapshot: GraphSnapshot,
    queue: VecDeque<PathState>,
    max_hops: usize,
    direction: Direction,
}

impl MultiHopPaths {
    fn new(snapshot: GraphSnapshot, start: usize, max_hops: usize, direction: Direction) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::new();
        queue.push_back(PathState {
            node: start,
            node_path: vec![start],
            edge_path: Vec::new(),
            visited,
        });
        Self {
            snapshot,
            queue,
            max_hops,
            direction,
        }
    }

    fn neighbors(&self, node: usize) -> Vec<crate::snapshot::EdgeRef> {
        match self.direction {
            Direction::Outgoing => self.snapshot.outgoing(node).to_vec(),
            Direction::Incoming => self.snapshot.incoming(node).to_vec(),
            Direction::Both => {
                let mut refs = self.snapshot.outgoing(node).to_vec();
                refs.extend_from_slice(self.snapshot.incoming(node));
                refs
            }
        }
    }
}

impl Iterator for MultiHopPaths {
    type Item = TraversalPath;

    fn next(&mut self) -> Option<TraversalPath> {
        while let Some(state) = self.queue.pop_front() {
            // Expand within the hop budget. The per-path visited set guards
            // against cycles; the graph is not guaranteed acyclic.
            if state.edge_path.len() < self.max_hops {
                for edge_ref in self.neighbors(state.node) {
                    if state.visited.contains(&edge_ref.neighbor) {
                        continue;
                    }
                    let mut node_path = state.node_path.clone();
                    node_path.push(edge_ref.neighbor);
                    let mut edge_path = state.edge_path.clone();
                    edge_path.push(edge_ref.edge);
                    let mut visited = state.visited.clone();
                    visited.insert(edge_ref.neighbor);
                    self.queue.push_back(PathState {
                        node: edge_ref.neighbor,
                        node_path,
                        edge_path,
                        visited,
                    });
                }
            }

            // The zero-hop root is frontier only, not a result.
            if !state.edge_path.is_empty() {
                return Some(TraversalPath {
                    nodes: state
                        .node_path
                        .iter()
                        .map(|&i| self.snapshot.node(i).id)
                        .collect(),
                    relations: state
                        .edge_path
                        .iter()
                        .map(|&i| self.snapshot.edge(i).id)
                        .collect(),
                });
            }
        }
        None
    }
}

/// Read-only query surface over one brand's knowledge graph.
pub struct GraphQueryEngine {
    nodes: Arc<dyn NodeRepository>,
    relations: Arc<dyn RelationRepository>,
}

impl GraphQueryEngine {
    pub fn new(nodes: Arc<dyn NodeRepository>, relations: Arc<dyn RelationRepository>) -> Self {
        Self { nodes, relations }
    }

    /// Load a point-in-time snapshot of one brand's graph.
    pub async fn snapshot(&self, brand_id: i64) -> Result<GraphSnapshot> {
        let nodes = self.nodes.list(ListNodesRequest::for_brand(brand_id)).await?;
        let relations = self
            .relations
            .list(ListRelationsRequest::for_brand(brand_id))
            .await?;
        Ok(GraphSnapshot::build(nodes, relations))
    }

    /// Full dump with aggregate stats.
    pub async fn export(&self, brand_id: i64) -> Result<GraphExport> {
        let snapshot = self.snapshot(brand_id).await?;

        let mut nodes_by_type: BTreeMap<NodeType, i64> = BTreeMap::new();
        for node in snapshot.nodes() {
            *nodes_by_type.entry(node.node_type).or_default() += 1;
        }
        let mut relations_by_type: BTreeMap<RelationType, i64> = BTreeMap::new();
        for edge in snapshot.edges() {
            *relations_by_type.entry(edge.relation_type).or_default() += 1;
        }
        let contradiction_count = relations_by_type
            .get(&RelationType::Contradicts)
            .copied()
            .unwrap_or(0);

        let stats = GraphStats {
            node_count: snapshot.node_count(),
            relation_count: snapshot.edge_count(),
            nodes_by_type,
            relations_by_type,
            contradiction_count,
        };

        debug!(
            brand_id,
            node_count = stats.node_count,
            relation_count = stats.relation_count,
            "Graph export"
        );

        Ok(GraphExport {
            nodes: snapshot.nodes().to_vec(),
            edges: snapshot.edges().to_vec(),
            stats,
        })
    }

    /// Breadth-first paths out of `start_node_id`, up to `max_hops`.
    ///
    /// Answers "why does this message matter" chains, e.g.
    /// key_message →addresses→ patient_tension →triggers→ symptom_burden.
    pub async fn multi_hop(
        &self,
        start_node_id: Uuid,
        max_hops: usize,
        direction: Direction,
    ) -> Result<MultiHopPaths> {
        let start = self.nodes.get(start_node_id).await?;
        let snapshot = self.snapshot(start.brand_id).await?;
        let start_idx = snapshot
            .index_of(start_node_id)
            .ok_or(brandgraph_core::Error::NodeNotFound(start_node_id))?;
        Ok(MultiHopPaths::new(snapshot, start_idx, max_hops, direction))
    }

    /// Nodes of a "needs coverage" type with zero incoming edges of a
    /// "covering" type — insights never addressed by brand messaging.
    pub async fn gap_analysis(
        &self,
        brand_id: i64,
        rules: &CoverageRules,
    ) -> Result<Vec<KnowledgeNode>> {
        let snapshot = self.snapshot(brand_id).await?;

        let mut gaps = Vec::new();
        for (idx, node) in snapshot.nodes().iter().enumerate() {
            if !rules.needs_coverage.contains(&node.node_type) {
                continue;
            }
            let covered = snapshot
                .incoming(idx)
                .iter()
                .any(|e| rules.covering.contains(&snapshot.edge(e.edge).relation_type));
            if !covered {
                gaps.push(node.clone());
            }
        }

        debug!(brand_id, result_count = gaps.len(), "Gap analysis");
        Ok(gaps)
    }

    /// All `contradicts` relations for a brand, newest first.
    pub async fn contradiction_scan(&self, brand_id: i64) -> Result<Vec<KnowledgeRelation>> {
        let mut contradictions = self
            .relations
            .list(
                ListRelationsRequest::for_brand(brand_id)
                    .with_relation_type(RelationType::Contradicts),
            )
            .await?;
        contradictions.reverse();
        Ok(contradictions)
    }
}
