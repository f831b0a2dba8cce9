//! Human verification lifecycle for knowledge nodes.
//!
//! A node starts unverified; an explicit user action marks it verified, and
//! an equally explicit action reverts it. There are no automatic
//! transitions in either direction, and verification never touches
//! `confidence` — that is the dedup merge rule's territory alone.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use brandgraph_core::{KnowledgeNode, NodeRepository, Result};

/// Flips the user-verification flag on nodes.
pub struct VerificationService {
    nodes: Arc<dyn NodeRepository>,
}

impl VerificationService {
    pub fn new(nodes: Arc<dyn NodeRepository>) -> Self {
        Self { nodes }
    }

    /// Mark a node as verified by a user. Idempotent: verifying an
    /// already-verified node returns it unchanged.
    pub async fn verify(&self, id: Uuid) -> Result<KnowledgeNode> {
        let node = self.nodes.get(id).await?;
        if node.verified_by_user {
            return Ok(node);
        }
        self.nodes.set_verified(id, true).await?;
        info!(node_id = %id, "Node verified");
        self.nodes.get(id).await
    }

    /// Revert a node to unverified. Idempotent the same way.
    pub async fn unverify(&self, id: Uuid) -> Result<KnowledgeNode> {
        let node = self.nodes.get(id).await?;
        if !node.verified_by_user {
            return Ok(node);
        }
        self.nodes.set_verified(id, false).await?;
        info!(node_id = %id, "Node verification reverted");
        self.nodes.get(id).await
    }
}
