//! Core traits for brandgraph abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. Repository traits
//! are the only seam through which components touch persisted state; every
//! external collaborator (embedding gateway, inference collaborator,
//! document processor) is consumed through a trait here and passed in
//! explicitly — no component reaches into ambient global state.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NODE REPOSITORY
// =============================================================================

/// Repository for knowledge node CRUD operations.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Insert a new node. Rejects invalid requests with a validation error;
    /// rejections are never partially applied.
    async fn create(&self, req: CreateNodeRequest) -> Result<KnowledgeNode>;

    /// Fetch a node by ID.
    async fn get(&self, id: Uuid) -> Result<KnowledgeNode>;

    /// List nodes for a brand, optionally filtered by type/segment,
    /// ordered by creation time.
    async fn list(&self, req: ListNodesRequest) -> Result<Vec<KnowledgeNode>>;

    /// Delete a node, cascading every relation that references it and its
    /// stored embedding.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Append a provenance source to a node (dedup merge).
    async fn append_source(&self, id: Uuid, source: SourceRef) -> Result<()>;

    /// Raise a node's confidence to `max(existing, candidate)` (dedup
    /// merge). The only confidence mutation after creation.
    async fn merge_confidence(&self, id: Uuid, candidate: f32) -> Result<()>;

    /// Set the user-verification flag. Used by the verification lifecycle.
    async fn set_verified(&self, id: Uuid, verified: bool) -> Result<()>;

    /// Exact-text lookup within a `(brand, type)` partition, used by dedup
    /// to short-circuit before the similarity scan.
    async fn find_by_text_hash(
        &self,
        brand_id: i64,
        node_type: NodeType,
        text_hash: &str,
    ) -> Result<Option<KnowledgeNode>>;

    /// Node counts per type for a brand (export stats).
    async fn count_by_type(&self, brand_id: i64) -> Result<Vec<(NodeType, i64)>>;
}

// =============================================================================
// RELATION REPOSITORY
// =============================================================================

/// Repository for knowledge relation operations.
///
/// Relations are immutable once created: there is no update operation.
#[async_trait]
pub trait RelationRepository: Send + Sync {
    /// Insert a new relation. Enforces no-self-loop, strength range, and
    /// brand isolation (relation and both endpoints share `brand_id`).
    async fn create(&self, req: CreateRelationRequest) -> Result<KnowledgeRelation>;

    /// Fetch a relation by ID.
    async fn get(&self, id: Uuid) -> Result<KnowledgeRelation>;

    /// List relations for a brand, optionally filtered by type, ordered by
    /// creation time.
    async fn list(&self, req: ListRelationsRequest) -> Result<Vec<KnowledgeRelation>>;

    /// All relations touching a node, in either direction.
    async fn for_node(&self, node_id: Uuid) -> Result<Vec<KnowledgeRelation>>;

    /// Delete a relation.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// NODE EMBEDDING REPOSITORY
// =============================================================================

/// Storage for one embedding vector per node, partitioned by
/// `(brand_id, node_type)` — the partition the dedup scan runs over.
#[async_trait]
pub trait NodeEmbeddingRepository: Send + Sync {
    /// Store the embedding for a node, replacing any existing one.
    async fn store(
        &self,
        node_id: Uuid,
        brand_id: i64,
        node_type: NodeType,
        vector: &Vector,
        model: &str,
    ) -> Result<()>;

    /// All `(node_id, vector)` pairs in one `(brand, type)` partition.
    async fn for_brand_type(
        &self,
        brand_id: i64,
        node_type: NodeType,
    ) -> Result<Vec<(Uuid, Vector)>>;

    /// Delete the embedding for a node.
    async fn delete_for_node(&self, node_id: Uuid) -> Result<()>;
}

// =============================================================================
// EXTERNAL COLLABORATORS
// =============================================================================

/// Gateway for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate an embedding vector for a single text.
    async fn embed(&self, text: &str) -> Result<Vector>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Collaborator that turns document text into candidate node proposals.
#[async_trait]
pub trait CandidateExtractionBackend: Send + Sync {
    /// Propose candidate nodes for one document.
    async fn extract(&self, document: &DocumentInput) -> Result<Vec<NodeCandidateProposal>>;
}

/// Collaborator that judges whether a typed relation holds between a node
/// pair. Returns `None` when no relation holds.
#[async_trait]
pub trait RelationInferenceBackend: Send + Sync {
    async fn infer(
        &self,
        from: &KnowledgeNode,
        to: &KnowledgeNode,
        eligible: &[RelationType],
    ) -> Result<Option<RelationProposal>>;
}

/// Existence check against the external document collaborator, used by the
/// ingestion pipeline to detect mid-batch document deletion.
#[async_trait]
pub trait DocumentGate: Send + Sync {
    async fn exists(&self, document_id: Uuid) -> Result<bool>;
}

/// Gate that reports every document as live. For contexts (tests, backfill
/// tools) where cancellation cannot occur.
pub struct AlwaysLiveGate;

#[async_trait]
impl DocumentGate for AlwaysLiveGate {
    async fn exists(&self, _document_id: Uuid) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_live_gate() {
        let gate = AlwaysLiveGate;
        assert!(gate.exists(Uuid::new_v4()).await.unwrap());
    }

    #[test]
    fn test_trait_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}

        assert_send_sync::<dyn NodeRepository>();
        assert_send_sync::<dyn RelationRepository>();
        assert_send_sync::<dyn NodeEmbeddingRepository>();
        assert_send_sync::<dyn EmbeddingBackend>();
        assert_send_sync::<dyn CandidateExtractionBackend>();
        assert_send_sync::<dyn RelationInferenceBackend>();
        assert_send_sync::<dyn DocumentGate>();
    }
}
