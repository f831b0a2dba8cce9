//! In-memory store implementing the repository traits.
//!
//! Backs embedded deployments and deterministic tests with the exact
//! contract the PostgreSQL repositories expose, including relation cascade
//! on node deletion and brand-isolation checks. All state lives behind one
//! RwLock shared by the per-entity repository handles; callers only ever
//! receive cloned values, never references into the maps.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use tokio::sync::RwLock;
use uuid::Uuid;

use brandgraph_core::{
    derive_summary, new_v7, CreateNodeRequest, CreateRelationRequest, Error, KnowledgeNode,
    KnowledgeRelation, ListNodesRequest, ListRelationsRequest, NodeEmbeddingRepository, NodeType,
    NodeRepository, RelationRepository, Result, SourceRef,
};

use crate::hash_text;

struct StoredNode {
    node: KnowledgeNode,
    text_hash: String,
    seq: u64,
}

struct StoredRelation {
    relation: KnowledgeRelation,
    seq: u64,
}

struct StoredEmbedding {
    brand_id: i64,
    node_type: NodeType,
    vector: Vector,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<Uuid, StoredNode>,
    relations: HashMap<Uuid, StoredRelation>,
    embeddings: HashMap<Uuid, StoredEmbedding>,
    // Insertion sequence: tie-break for same-millisecond created_at ordering.
    next_seq: u64,
}

/// In-memory node/relation/embedding store.
///
/// Mirrors the shape of [`crate::Database`]: one shared state, per-entity
/// repository handles obtained from it.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node repository handle over this store.
    pub fn nodes(&self) -> InMemoryNodeRepository {
        InMemoryNodeRepository {
            inner: self.inner.clone(),
        }
    }

    /// Relation repository handle over this store.
    pub fn relations(&self) -> InMemoryRelationRepository {
        InMemoryRelationRepository {
            inner: self.inner.clone(),
        }
    }

    /// Embedding repository handle over this store.
    pub fn embeddings(&self) -> InMemoryEmbeddingRepository {
        InMemoryEmbeddingRepository {
            inner: self.inner.clone(),
        }
    }

    /// Total node count across all brands (test/diagnostic helper).
    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    /// Total relation count across all brands (test/diagnostic helper).
    pub async fn relation_count(&self) -> usize {
        self.inner.read().await.relations.len()
    }
}

/// NodeRepository over shared in-memory state.
#[derive(Clone)]
pub struct InMemoryNodeRepository {
    inner: Arc<RwLock<Inner>>,
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn create(&self, req: CreateNodeRequest) -> Result<KnowledgeNode> {
        req.validate()?;

        let node = KnowledgeNode {
            id: new_v7(),
            brand_id: req.brand_id,
            node_type: req.node_type,
            summary: req
                .summary
                .clone()
                .or_else(|| Some(derive_summary(&req.text))),
            text: req.text,
            segment: req.segment,
            journey_stage: req.journey_stage,
            sources: vec![req.source],
            confidence: req.confidence,
            verified_by_user: false,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.nodes.insert(
            node.id,
            StoredNode {
                text_hash: hash_text(&node.text),
                node: node.clone(),
                seq,
            },
        );
        Ok(node)
    }

    async fn get(&self, id: Uuid) -> Result<KnowledgeNode> {
        self.inner
            .read()
            .await
            .nodes
            .get(&id)
            .map(|s| s.node.clone())
            .ok_or(Error::NodeNotFound(id))
    }

    async fn list(&self, req: ListNodesRequest) -> Result<Vec<KnowledgeNode>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<&StoredNode> = inner
            .nodes
            .values()
            .filter(|s| s.node.brand_id == req.brand_id)
            .filter(|s| req.node_type.is_none_or(|t| s.node.node_type == t))
            .filter(|s| {
                req.segment
                    .as_deref()
                    .is_none_or(|seg| s.node.segment.as_deref() == Some(seg))
            })
            .collect();
        matches.sort_by_key(|s| s.seq);
        Ok(matches.into_iter().map(|s| s.node.clone()).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.nodes.remove(&id).is_none() {
            return Err(Error::NodeNotFound(id));
        }
        // Cascade: drop every relation touching the node and its embedding.
        inner
            .relations
            .retain(|_, s| s.relation.from_node_id != id && s.relation.to_node_id != id);
        inner.embeddings.remove(&id);
        Ok(())
    }

    async fn append_source(&self, id: Uuid, source: SourceRef) -> Result<()> {
        let mut inner = self.inner.write().await;
        let stored = inner.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        stored.node.sources.push(source);
        Ok(())
    }

    async fn merge_confidence(&self, id: Uuid, candidate: f32) -> Result<()> {
        if !candidate.is_finite() || !(0.0..=1.0).contains(&candidate) {
            return Err(Error::Validation(format!(
                "confidence must be within [0, 1], got {} (node {})",
                candidate, id
            )));
        }
        let mut inner = self.inner.write().await;
        let stored = inner.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        stored.node.confidence = stored.node.confidence.max(candidate);
        Ok(())
    }

    async fn set_verified(&self, id: Uuid, verified: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        let stored = inner.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        stored.node.verified_by_user = verified;
        Ok(())
    }

    async fn find_by_text_hash(
        &self,
        brand_id: i64,
        node_type: NodeType,
        text_hash: &str,
    ) -> Result<Option<KnowledgeNode>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<&StoredNode> = inner
            .nodes
            .values()
            .filter(|s| {
                s.node.brand_id == brand_id
                    && s.node.node_type == node_type
                    && s.text_hash == text_hash
            })
            .collect();
        matches.sort_by_key(|s| s.seq);
        Ok(matches.first().map(|s| s.node.clone()))
    }

    async fn count_by_type(&self, brand_id: i64) -> Result<Vec<(NodeType, i64)>> {
        let inner = self.inner.read().await;
        let mut counts: BTreeMap<NodeType, i64> = BTreeMap::new();
        for stored in inner.nodes.values() {
            if stored.node.brand_id == brand_id {
                *counts.entry(stored.node.node_type).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }
}

/// RelationRepository over shared in-memory state.
#[derive(Clone)]
pub struct InMemoryRelationRepository {
    inner: Arc<RwLock<Inner>>,
}

#[async_trait]
impl RelationRepository for InMemoryRelationRepository {
    async fn create(&self, req: CreateRelationRequest) -> Result<KnowledgeRelation> {
        req.validate()?;

        let mut inner = self.inner.write().await;
        for endpoint in [req.from_node_id, req.to_node_id] {
            let stored = inner
                .nodes
                .get(&endpoint)
                .ok_or(Error::NodeNotFound(endpoint))?;
            if stored.node.brand_id != req.brand_id {
                return Err(Error::Validation(format!(
                    "cross-brand relation rejected: node {} belongs to brand {}, relation to brand {}",
                    endpoint, stored.node.brand_id, req.brand_id
                )));
            }
        }

        let relation = KnowledgeRelation {
            id: new_v7(),
            brand_id: req.brand_id,
            from_node_id: req.from_node_id,
            to_node_id: req.to_node_id,
            relation_type: req.relation_type,
            strength: req.strength,
            context: req.context,
            inferred_by: req.inferred_by,
            created_at: Utc::now(),
        };

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.relations.insert(
            relation.id,
            StoredRelation {
                relation: relation.clone(),
                seq,
            },
        );
        Ok(relation)
    }

    async fn get(&self, id: Uuid) -> Result<KnowledgeRelation> {
        self.inner
            .read()
            .await
            .relations
            .get(&id)
            .map(|s| s.relation.clone())
            .ok_or(Error::RelationNotFound(id))
    }

    async fn list(&self, req: ListRelationsRequest) -> Result<Vec<KnowledgeRelation>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<&StoredRelation> = inner
            .relations
            .values()
            .filter(|s| s.relation.brand_id == req.brand_id)
            .filter(|s| {
                req.relation_type
                    .is_none_or(|t| s.relation.relation_type == t)
            })
            .collect();
        matches.sort_by_key(|s| s.seq);
        Ok(matches.into_iter().map(|s| s.relation.clone()).collect())
    }

    async fn for_node(&self, node_id: Uuid) -> Result<Vec<KnowledgeRelation>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<&StoredRelation> = inner
            .relations
            .values()
            .filter(|s| s.relation.from_node_id == node_id || s.relation.to_node_id == node_id)
            .collect();
        matches.sort_by_key(|s| s.seq);
        Ok(matches.into_iter().map(|s| s.relation.clone()).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .relations
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::RelationNotFound(id))
    }
}

/// NodeEmbeddingRepository over shared in-memory state.
#[derive(Clone)]
pub struct InMemoryEmbeddingRepository {
    inner: Arc<RwLock<Inner>>,
}

#[async_trait]
impl NodeEmbeddingRepository for InMemoryEmbeddingRepository {
    async fn store(
        &self,
        node_id: Uuid,
        brand_id: i64,
        node_type: NodeType,
        vector: &Vector,
        _model: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.embeddings.insert(
            node_id,
            StoredEmbedding {
                brand_id,
                node_type,
                vector: vector.clone(),
            },
        );
        Ok(())
    }

    async fn for_brand_type(
        &self,
        brand_id: i64,
        node_type: NodeType,
    ) -> Result<Vec<(Uuid, Vector)>> {
        let inner = self.inner.read().await;
        let mut pairs: Vec<(Uuid, Vector)> = inner
            .embeddings
            .iter()
            .filter(|(_, e)| e.brand_id == brand_id && e.node_type == node_type)
            .map(|(id, e)| (*id, e.vector.clone()))
            .collect();
        pairs.sort_by_key(|(id, _)| *id);
        Ok(pairs)
    }

    async fn delete_for_node(&self, node_id: Uuid) -> Result<()> {
        self.inner.write().await.embeddings.remove(&node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandgraph_core::{Provenance, RelationType};

    fn node_request(brand_id: i64, node_type: NodeType, text: &str) -> CreateNodeRequest {
        CreateNodeRequest {
            brand_id,
            node_type,
            text: text.to_string(),
            summary: None,
            segment: None,
            journey_stage: None,
            source: SourceRef {
                document_id: Uuid::new_v4(),
                quote: None,
            },
            confidence: 0.8,
        }
    }

    fn relation_request(
        brand_id: i64,
        from: Uuid,
        to: Uuid,
        relation_type: RelationType,
    ) -> CreateRelationRequest {
        CreateRelationRequest {
            brand_id,
            from_node_id: from,
            to_node_id: to,
            relation_type,
            strength: 0.8,
            context: "test".to_string(),
            inferred_by: Provenance::Llm,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_node() {
        let store = InMemoryStore::new();
        let node = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "Low health literacy"))
            .await
            .unwrap();

        let fetched = store.nodes().get(node.id).await.unwrap();
        assert_eq!(fetched.id, node.id);
        assert_eq!(fetched.brand_id, 5);
        assert_eq!(fetched.node_type, NodeType::UnmetNeed);
        assert!(!fetched.verified_by_user);
        assert_eq!(fetched.sources.len(), 1);
        assert_eq!(fetched.summary.as_deref(), Some("Low health literacy"));
    }

    #[tokio::test]
    async fn test_get_missing_node_is_not_found() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        let err = store.nodes().get(id).await.unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_candidate() {
        let store = InMemoryStore::new();
        let mut req = node_request(5, NodeType::KeyMessage, "text");
        req.confidence = 2.0;
        assert!(matches!(
            store.nodes().create(req).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_creation_and_filtered() {
        let store = InMemoryStore::new();
        let a = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "first"))
            .await
            .unwrap();
        let b = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "second"))
            .await
            .unwrap();
        store
            .nodes()
            .create(node_request(5, NodeType::KeyMessage, "other type"))
            .await
            .unwrap();
        store
            .nodes()
            .create(node_request(9, NodeType::UnmetNeed, "other brand"))
            .await
            .unwrap();

        let listed = store
            .nodes()
            .list(ListNodesRequest::for_brand(5).with_node_type(NodeType::UnmetNeed))
            .await
            .unwrap();
        assert_eq!(
            listed.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_segment() {
        let store = InMemoryStore::new();
        let mut req = node_request(5, NodeType::PatientTension, "caregiver fear");
        req.segment = Some("caregivers".to_string());
        let tagged = store.nodes().create(req).await.unwrap();
        store
            .nodes()
            .create(node_request(5, NodeType::PatientTension, "untagged"))
            .await
            .unwrap();

        let listed = store
            .nodes()
            .list(ListNodesRequest::for_brand(5).with_segment("caregivers"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, tagged.id);
    }

    #[tokio::test]
    async fn test_delete_cascades_relations_and_embedding() {
        let store = InMemoryStore::new();
        let a = store
            .nodes()
            .create(node_request(5, NodeType::KeyMessage, "message"))
            .await
            .unwrap();
        let b = store
            .nodes()
            .create(node_request(5, NodeType::PatientTension, "tension"))
            .await
            .unwrap();
        let c = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "need"))
            .await
            .unwrap();

        store
            .relations()
            .create(relation_request(5, a.id, b.id, RelationType::Addresses))
            .await
            .unwrap();
        store
            .relations()
            .create(relation_request(5, c.id, a.id, RelationType::Supports))
            .await
            .unwrap();
        let survivor = store
            .relations()
            .create(relation_request(5, c.id, b.id, RelationType::Triggers))
            .await
            .unwrap();
        store
            .embeddings()
            .store(a.id, 5, NodeType::KeyMessage, &Vector::from(vec![1.0, 0.0]), "test-model")
            .await
            .unwrap();

        store.nodes().delete(a.id).await.unwrap();

        // Every relation where the node was an endpoint is gone.
        assert!(store.relations().for_node(a.id).await.unwrap().is_empty());
        let remaining = store
            .relations()
            .list(ListRelationsRequest::for_brand(5))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, survivor.id);
        assert!(store
            .embeddings()
            .for_brand_type(5, NodeType::KeyMessage)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_relation_rejects_self_loop() {
        let store = InMemoryStore::new();
        let a = store
            .nodes()
            .create(node_request(5, NodeType::KeyMessage, "message"))
            .await
            .unwrap();

        let err = store
            .relations()
            .create(relation_request(5, a.id, a.id, RelationType::Supports))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.relation_count().await, 0);
    }

    #[tokio::test]
    async fn test_relation_rejects_cross_brand_endpoints() {
        let store = InMemoryStore::new();
        let a = store
            .nodes()
            .create(node_request(5, NodeType::KeyMessage, "brand five"))
            .await
            .unwrap();
        let b = store
            .nodes()
            .create(node_request(9, NodeType::PatientTension, "brand nine"))
            .await
            .unwrap();

        let err = store
            .relations()
            .create(relation_request(5, a.id, b.id, RelationType::Addresses))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("cross-brand"));
    }

    #[tokio::test]
    async fn test_relation_rejects_missing_endpoint() {
        let store = InMemoryStore::new();
        let a = store
            .nodes()
            .create(node_request(5, NodeType::KeyMessage, "message"))
            .await
            .unwrap();
        let ghost = Uuid::new_v4();

        let err = store
            .relations()
            .create(relation_request(5, a.id, ghost, RelationType::Addresses))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn test_append_source_grows_provenance() {
        let store = InMemoryStore::new();
        let node = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "insight"))
            .await
            .unwrap();
        assert_eq!(node.sources.len(), 1);

        store
            .nodes()
            .append_source(
                node.id,
                SourceRef {
                    document_id: Uuid::new_v4(),
                    quote: Some("second doc".to_string()),
                },
            )
            .await
            .unwrap();

        let fetched = store.nodes().get(node.id).await.unwrap();
        assert_eq!(fetched.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_confidence_takes_max() {
        let store = InMemoryStore::new();
        let node = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "insight"))
            .await
            .unwrap();

        store.nodes().merge_confidence(node.id, 0.3).await.unwrap();
        assert_eq!(store.nodes().get(node.id).await.unwrap().confidence, 0.8);

        store.nodes().merge_confidence(node.id, 0.95).await.unwrap();
        assert_eq!(store.nodes().get(node.id).await.unwrap().confidence, 0.95);

        assert!(store.nodes().merge_confidence(node.id, 1.5).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_text_hash_scoped_to_brand_and_type() {
        let store = InMemoryStore::new();
        let node = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "identical text"))
            .await
            .unwrap();
        store
            .nodes()
            .create(node_request(9, NodeType::UnmetNeed, "identical text"))
            .await
            .unwrap();

        let hash = hash_text("identical text");
        let hit = store
            .nodes()
            .find_by_text_hash(5, NodeType::UnmetNeed, &hash)
            .await
            .unwrap();
        assert_eq!(hit.unwrap().id, node.id);

        assert!(store
            .nodes()
            .find_by_text_hash(5, NodeType::KeyMessage, &hash)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_count_by_type() {
        let store = InMemoryStore::new();
        for text in ["a", "b"] {
            store
                .nodes()
                .create(node_request(5, NodeType::KeyMessage, text))
                .await
                .unwrap();
        }
        store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "c"))
            .await
            .unwrap();

        let counts = store.nodes().count_by_type(5).await.unwrap();
        assert_eq!(
            counts,
            vec![(NodeType::KeyMessage, 2), (NodeType::UnmetNeed, 1)]
        );
    }

    #[tokio::test]
    async fn test_embeddings_partitioned_by_brand_and_type() {
        let store = InMemoryStore::new();
        let a = store
            .nodes()
            .create(node_request(5, NodeType::UnmetNeed, "a"))
            .await
            .unwrap();
        let b = store
            .nodes()
            .create(node_request(5, NodeType::KeyMessage, "b"))
            .await
            .unwrap();

        store
            .embeddings()
            .store(a.id, 5, NodeType::UnmetNeed, &Vector::from(vec![1.0, 0.0]), "m")
            .await
            .unwrap();
        store
            .embeddings()
            .store(b.id, 5, NodeType::KeyMessage, &Vector::from(vec![0.0, 1.0]), "m")
            .await
            .unwrap();

        let partition = store
            .embeddings()
            .for_brand_type(5, NodeType::UnmetNeed)
            .await
            .unwrap();
        assert_eq!(partition.len(), 1);
        assert_eq!(partition[0].0, a.id);
    }

    #[tokio::test]
    async fn test_set_verified_round_trip() {
        let store = InMemoryStore::new();
        let node = store
            .nodes()
            .create(node_request(5, NodeType::KeyMessage, "msg"))
            .await
            .unwrap();

        store.nodes().set_verified(node.id, true).await.unwrap();
        assert!(store.nodes().get(node.id).await.unwrap().verified_by_user);

        store.nodes().set_verified(node.id, false).await.unwrap();
        assert!(!store.nodes().get(node.id).await.unwrap().verified_by_user);
    }
}
