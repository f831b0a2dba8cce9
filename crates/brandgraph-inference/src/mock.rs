//! Mock inference backends for deterministic testing.
//!
//! `MockInference` plays all three collaborator roles (embedding gateway,
//! candidate extraction, pair inference) with scripted, fully deterministic
//! behavior. Unscripted embeddings are derived from a content hash so the
//! same text always produces the same vector; unscripted pairs produce no
//! relation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use async_trait::async_trait;

use brandgraph_core::{
    CandidateExtractionBackend, DocumentGate, DocumentInput, EmbeddingBackend, Error,
    KnowledgeNode, NodeCandidateProposal, RelationInferenceBackend, RelationProposal,
    RelationType, Result, Vector,
};

/// Scripted mock backend for all collaborator roles.
#[derive(Default)]
pub struct MockInference {
    dimension: usize,
    embeddings: HashMap<String, Vec<f32>>,
    fail_embeddings: AtomicBool,
    proposals: HashMap<(String, String), RelationProposal>,
    failing_pairs: HashSet<(String, String)>,
    candidates: HashMap<Uuid, Vec<NodeCandidateProposal>>,
    embed_calls: AtomicUsize,
    infer_calls: AtomicUsize,
}

impl MockInference {
    pub fn new() -> Self {
        Self {
            dimension: 8,
            ..Default::default()
        }
    }

    /// Set the embedding dimension for hash-derived vectors.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Script the embedding returned for an exact text.
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(text.into(), vector);
        self
    }

    /// Script the proposal returned for an exact `(from.text, to.text)` pair.
    pub fn with_proposal(
        mut self,
        from_text: impl Into<String>,
        to_text: impl Into<String>,
        relation_type: RelationType,
        strength: f32,
        context: impl Into<String>,
    ) -> Self {
        self.proposals.insert(
            (from_text.into(), to_text.into()),
            RelationProposal {
                relation_type,
                strength,
                context: context.into(),
            },
        );
        self
    }

    /// Make inference fail for an exact `(from.text, to.text)` pair.
    pub fn with_failing_pair(
        mut self,
        from_text: impl Into<String>,
        to_text: impl Into<String>,
    ) -> Self {
        self.failing_pairs.insert((from_text.into(), to_text.into()));
        self
    }

    /// Script the candidates returned for a document.
    pub fn with_candidates(
        mut self,
        document_id: Uuid,
        candidates: Vec<NodeCandidateProposal>,
    ) -> Self {
        self.candidates.insert(document_id, candidates);
        self
    }

    /// Toggle embedding failure at runtime (fail-closed / fail-open tests).
    pub fn set_fail_embeddings(&self, fail: bool) {
        self.fail_embeddings.store(fail, Ordering::SeqCst);
    }

    /// Number of embed calls made so far.
    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Number of pair-inference calls made so far.
    pub fn infer_call_count(&self) -> usize {
        self.infer_calls.load(Ordering::SeqCst)
    }

    /// Deterministic unit vector derived from the text content.
    fn hash_vector(&self, text: &str) -> Vec<f32> {
        // FNV-1a then a splitmix-style expansion; stable across runs.
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            state ^= byte as u64;
            state = state.wrapping_mul(0x100_0000_01b3);
        }

        let mut values = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^= z >> 31;
            values.push(((z as f64 / u64::MAX as f64) as f32) * 2.0 - 1.0);
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut values {
                *v /= norm;
            }
        }
        values
    }
}

#[async_trait]
impl EmbeddingBackend for MockInference {
    async fn embed(&self, text: &str) -> Result<Vector> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embeddings.load(Ordering::SeqCst) {
            return Err(Error::Embedding("mock embedding gateway down".to_string()));
        }
        let values = self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hash_vector(text));
        Ok(Vector::from(values))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl RelationInferenceBackend for MockInference {
    async fn infer(
        &self,
        from: &KnowledgeNode,
        to: &KnowledgeNode,
        eligible: &[RelationType],
    ) -> Result<Option<RelationProposal>> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);
        let key = (from.text.clone(), to.text.clone());
        if self.failing_pairs.contains(&key) {
            return Err(Error::Inference("mock inference failure".to_string()));
        }
        Ok(self
            .proposals
            .get(&key)
            .filter(|p| eligible.contains(&p.relation_type))
            .cloned())
    }
}

#[async_trait]
impl CandidateExtractionBackend for MockInference {
    async fn extract(&self, document: &DocumentInput) -> Result<Vec<NodeCandidateProposal>> {
        self.candidates
            .get(&document.document_id)
            .cloned()
            .ok_or_else(|| {
                Error::Inference(format!(
                    "no scripted candidates for document {}",
                    document.document_id
                ))
            })
    }
}

/// Document gate backed by an explicit deleted-set.
#[derive(Default)]
pub struct MockDocumentGate {
    deleted: Mutex<HashSet<Uuid>>,
}

impl MockDocumentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a document as deleted; later `exists` calls return false.
    pub fn mark_deleted(&self, document_id: Uuid) {
        self.deleted.lock().unwrap().insert(document_id);
    }
}

#[async_trait]
impl DocumentGate for MockDocumentGate {
    async fn exists(&self, document_id: Uuid) -> Result<bool> {
        Ok(!self.deleted.lock().unwrap().contains(&document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandgraph_core::{new_v7, NodeType, SourceRef};
    use chrono::Utc;

    fn node(node_type: NodeType, text: &str) -> KnowledgeNode {
        KnowledgeNode {
            id: new_v7(),
            brand_id: 5,
            node_type,
            text: text.to_string(),
            summary: None,
            segment: None,
            journey_stage: None,
            sources: vec![SourceRef {
                document_id: Uuid::new_v4(),
                quote: None,
            }],
            confidence: 0.8,
            verified_by_user: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_hash_embeddings_are_deterministic() {
        let mock = MockInference::new();
        let a = mock.embed("same text").await.unwrap();
        let b = mock.embed("same text").await.unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
        assert_eq!(mock.embed_call_count(), 2);
    }

    #[tokio::test]
    async fn test_hash_embeddings_are_normalized() {
        let mock = MockInference::new().with_dimension(16);
        let v = mock.embed("anything").await.unwrap();
        let norm: f32 = v.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_scripted_embedding_overrides_hash() {
        let mock = MockInference::new().with_embedding("pinned", vec![1.0, 0.0]);
        let v = mock.embed("pinned").await.unwrap();
        assert_eq!(v.as_slice(), &[1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_embedding_failure_toggle() {
        let mock = MockInference::new();
        mock.set_fail_embeddings(true);
        assert!(mock.embed("x").await.is_err());
        mock.set_fail_embeddings(false);
        assert!(mock.embed("x").await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_proposal_respects_eligibility() {
        let mock = MockInference::new().with_proposal(
            "a",
            "b",
            RelationType::Addresses,
            0.8,
            "scripted",
        );
        let from = node(NodeType::KeyMessage, "a");
        let to = node(NodeType::PatientTension, "b");

        let hit = mock
            .infer(&from, &to, &[RelationType::Addresses])
            .await
            .unwrap();
        assert!(hit.is_some());

        // Same pair, but the proposal's type is not eligible.
        let miss = mock
            .infer(&from, &to, &[RelationType::Supports])
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_unscripted_pair_has_no_relation() {
        let mock = MockInference::new();
        let from = node(NodeType::KeyMessage, "a");
        let to = node(NodeType::PatientTension, "b");
        assert!(mock
            .infer(&from, &to, &RelationType::ALL)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failing_pair_errors() {
        let mock = MockInference::new().with_failing_pair("a", "b");
        let from = node(NodeType::KeyMessage, "a");
        let to = node(NodeType::PatientTension, "b");
        assert!(mock.infer(&from, &to, &RelationType::ALL).await.is_err());
    }

    #[tokio::test]
    async fn test_document_gate() {
        let gate = MockDocumentGate::new();
        let id = Uuid::new_v4();
        assert!(gate.exists(id).await.unwrap());
        gate.mark_deleted(id);
        assert!(!gate.exists(id).await.unwrap());
    }
}
