//! Index-addressable snapshot of one brand's graph.
//!
//! Traversal needs random access by node and cheap adjacency walks, and the
//! graph is not guaranteed acyclic — so the snapshot keeps nodes in an
//! arena `Vec` with edges as index pairs, and every algorithm over it
//! carries an explicit visited set and hop budget instead of recursing.
//!
//! A snapshot is built per query call from already-persisted state and
//! holds no connection to the store: queries running mid-batch simply see
//! the partial node set that was committed at load time.

use std::collections::HashMap;

use uuid::Uuid;

use brandgraph_core::{KnowledgeNode, KnowledgeRelation};

/// Adjacency entry: the edge's arena index and the neighbor's node index.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef {
    pub edge: usize,
    pub neighbor: usize,
}

/// Immutable arena view of one brand's nodes and relations.
pub struct GraphSnapshot {
    nodes: Vec<KnowledgeNode>,
    index: HashMap<Uuid, usize>,
    edges: Vec<KnowledgeRelation>,
    outgoing: Vec<Vec<EdgeRef>>,
    incoming: Vec<Vec<EdgeRef>>,
}

impl GraphSnapshot {
    /// Build a snapshot from materialized nodes and relations.
    ///
    /// Relations whose endpoints are missing from `nodes` are dropped: a
    /// query racing an in-flight batch may load a relation before both of
    /// its endpoints, and a dangling index would poison every traversal.
    pub fn build(nodes: Vec<KnowledgeNode>, relations: Vec<KnowledgeRelation>) -> Self {
        let index: HashMap<Uuid, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id, i))
            .collect();

        let mut edges = Vec::with_capacity(relations.len());
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for relation in relations {
            let (Some(&from), Some(&to)) = (
                index.get(&relation.from_node_id),
                index.get(&relation.to_node_id),
            ) else {
                continue;
            };
            let edge = edges.len();
            outgoing[from].push(EdgeRef { edge, neighbor: to });
            incoming[to].push(EdgeRef {
                edge,
                neighbor: from,
            });
            edges.push(relation);
        }

        Self {
            nodes,
            index,
            edges,
            outgoing,
            incoming,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[KnowledgeNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[KnowledgeRelation] {
        &self.edges
    }

    pub fn node(&self, idx: usize) -> &KnowledgeNode {
        &self.nodes[idx]
    }

    pub fn edge(&self, idx: usize) -> &KnowledgeRelation {
        &self.edges[idx]
    }

    /// Arena index for a node id, if the node is in this snapshot.
    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn outgoing(&self, idx: usize) -> &[EdgeRef] {
        &self.outgoing[idx]
    }

    pub fn incoming(&self, idx: usize) -> &[EdgeRef] {
        &self.incoming[idx]
    }
}
