//! Document ingestion pipeline.
//!
//! One call runs one document's whole batch: extraction → per-candidate
//! dedup → relationship inference, in that order. Relationship inference
//! only starts once every candidate is durably committed, because the pair
//! scan needs the complete node set.
//!
//! Candidate-level failures (validation, embedding gateway under the
//! fail-closed policy) skip that candidate and continue — one bad candidate
//! in a batch of N must not abort the other N-1. Deletion of the source
//! document while the batch is in flight cancels the batch: every node this
//! batch created is removed (cascading its relations) before the error is
//! returned, so nothing orphaned survives.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use brandgraph_core::{
    CandidateExtractionBackend, CreateNodeRequest, DocumentGate, DocumentInput, Error,
    IngestReport, NodeRepository, Result, SourceRef,
};
use brandgraph_graph::{DedupService, RelationInferenceEngine};

/// Runs extraction + inference batches for single documents.
pub struct IngestPipeline {
    extraction: Arc<dyn CandidateExtractionBackend>,
    dedup: Arc<DedupService>,
    inference: Arc<RelationInferenceEngine>,
    nodes: Arc<dyn NodeRepository>,
    gate: Arc<dyn DocumentGate>,
}

impl IngestPipeline {
    pub fn new(
        extraction: Arc<dyn CandidateExtractionBackend>,
        dedup: Arc<DedupService>,
        inference: Arc<RelationInferenceEngine>,
        nodes: Arc<dyn NodeRepository>,
        gate: Arc<dyn DocumentGate>,
    ) -> Self {
        Self {
            extraction,
            dedup,
            inference,
            nodes,
            gate,
        }
    }

    /// Ingest one document and report what the batch produced.
    pub async fn ingest_document(&self, document: DocumentInput) -> Result<IngestReport> {
        let start = Instant::now();
        let document_id = document.document_id;

        if !self.gate.exists(document_id).await? {
            return Err(Error::DocumentNotFound(document_id));
        }

        let candidates = self.extraction.extract(&document).await?;
        debug!(
            document_id = %document_id,
            brand_id = document.brand_id,
            candidate_count = candidates.len(),
            "Candidates extracted"
        );

        let mut report = IngestReport::default();
        let mut created: Vec<Uuid> = Vec::new();
        for candidate in candidates {
            let req = CreateNodeRequest {
                brand_id: document.brand_id,
                node_type: candidate.node_type,
                text: candidate.text,
                summary: candidate.summary,
                segment: candidate.segment,
                journey_stage: candidate.journey_stage,
                source: SourceRef {
                    document_id,
                    quote: candidate.source_quote,
                },
                confidence: candidate.confidence,
            };

            match self.dedup.find_or_create(req).await {
                Ok(outcome) if outcome.is_new => {
                    created.push(outcome.node.id);
                    report.nodes_extracted += 1;
                }
                Ok(_) => report.nodes_merged += 1,
                Err(e @ (Error::Validation(_) | Error::Embedding(_))) => {
                    warn!(
                        document_id = %document_id,
                        error = %e,
                        "Skipping candidate"
                    );
                    report.nodes_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        // The document may have been deleted while candidates were being
        // committed; inference over a cancelled batch would write orphans.
        self.ensure_live_or_rollback(document_id, &created).await?;

        let relations = self
            .inference
            .infer_for_batch(document.brand_id, &created)
            .await?;
        report.relationships_inferred = relations.len();

        // Final check: a deletion racing the inference stage discards the
        // batch too. Deleting the created nodes cascades their relations.
        self.ensure_live_or_rollback(document_id, &created).await?;

        info!(
            document_id = %document_id,
            brand_id = document.brand_id,
            nodes_extracted = report.nodes_extracted,
            nodes_merged = report.nodes_merged,
            nodes_skipped = report.nodes_skipped,
            relationships_inferred = report.relationships_inferred,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document ingested"
        );
        Ok(report)
    }

    async fn ensure_live_or_rollback(&self, document_id: Uuid, created: &[Uuid]) -> Result<()> {
        if self.gate.exists(document_id).await? {
            return Ok(());
        }
        warn!(
            document_id = %document_id,
            created = created.len(),
            "Document deleted mid-batch, rolling back"
        );
        for node_id in created {
            match self.nodes.delete(*node_id).await {
                Ok(()) | Err(Error::NodeNotFound(_)) => {}
                Err(e) => warn!(node_id = %node_id, error = %e, "Rollback delete failed"),
            }
        }
        Err(Error::BatchCancelled(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brandgraph_core::{
        AlwaysLiveGate, DocumentKind, ListRelationsRequest, NodeCandidateProposal, NodeType,
        RelationRepository, RelationType,
    };
    use brandgraph_db::InMemoryStore;
    use brandgraph_graph::{DedupConfig, InferenceEngineConfig};
    use brandgraph_inference::{MockDocumentGate, MockInference};

    fn candidate(node_type: NodeType, text: &str, confidence: f32) -> NodeCandidateProposal {
        NodeCandidateProposal {
            node_type,
            text: text.to_string(),
            summary: None,
            segment: None,
            journey_stage: None,
            source_quote: Some("quoted".to_string()),
            confidence,
        }
    }

    fn document(document_id: Uuid) -> DocumentInput {
        DocumentInput {
            document_id,
            brand_id: 5,
            kind: DocumentKind::Messaging,
            text: "document body".to_string(),
        }
    }

    fn pipeline(
        store: &InMemoryStore,
        mock: Arc<MockInference>,
        gate: Arc<dyn DocumentGate>,
    ) -> IngestPipeline {
        let dedup = Arc::new(DedupService::new(
            Arc::new(store.nodes()),
            Arc::new(store.embeddings()),
            mock.clone(),
            DedupConfig::default(),
        ));
        let inference = Arc::new(RelationInferenceEngine::new(
            Arc::new(store.nodes()),
            Arc::new(store.relations()),
            mock.clone(),
            InferenceEngineConfig::default(),
        ));
        IngestPipeline::new(mock, dedup, inference, Arc::new(store.nodes()), gate)
    }

    #[tokio::test]
    async fn test_full_ingest_extracts_and_infers() {
        let store = InMemoryStore::new();
        let doc_id = Uuid::new_v4();
        let mock = Arc::new(
            MockInference::new()
                .with_candidates(
                    doc_id,
                    vec![
                        candidate(NodeType::KeyMessage, "simple dosing", 0.9),
                        candidate(NodeType::PatientTension, "regimen fear", 0.8),
                    ],
                )
                .with_proposal(
                    "simple dosing",
                    "regimen fear",
                    RelationType::Addresses,
                    0.8,
                    "resolves the fear",
                ),
        );
        let pipeline = pipeline(&store, mock, Arc::new(AlwaysLiveGate));

        let report = pipeline.ingest_document(document(doc_id)).await.unwrap();

        assert_eq!(report.nodes_extracted, 2);
        assert_eq!(report.nodes_merged, 0);
        assert_eq!(report.nodes_skipped, 0);
        assert_eq!(report.relationships_inferred, 1);

        let relations = store
            .relations()
            .list(ListRelationsRequest::for_brand(5))
            .await
            .unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, RelationType::Addresses);
        // Provenance points back to the originating document.
        let from = store.nodes().get(relations[0].from_node_id).await.unwrap();
        assert_eq!(from.sources[0].document_id, doc_id);
    }

    #[tokio::test]
    async fn test_duplicate_across_documents_merges() {
        let store = InMemoryStore::new();
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let mock = Arc::new(
            MockInference::new()
                .with_candidates(doc_a, vec![candidate(NodeType::UnmetNeed, "same insight", 0.6)])
                .with_candidates(doc_b, vec![candidate(NodeType::UnmetNeed, "same insight", 0.9)]),
        );
        let pipeline = pipeline(&store, mock, Arc::new(AlwaysLiveGate));

        let first = pipeline.ingest_document(document(doc_a)).await.unwrap();
        assert_eq!(first.nodes_extracted, 1);

        let second = pipeline.ingest_document(document(doc_b)).await.unwrap();
        assert_eq!(second.nodes_extracted, 0);
        assert_eq!(second.nodes_merged, 1);

        assert_eq!(store.node_count().await, 1);
        let nodes = store
            .nodes()
            .list(brandgraph_core::ListNodesRequest::for_brand(5))
            .await
            .unwrap();
        assert_eq!(nodes[0].sources.len(), 2);
        assert_eq!(nodes[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_invalid_candidate_skipped_rest_continue() {
        let store = InMemoryStore::new();
        let doc_id = Uuid::new_v4();
        let mock = Arc::new(MockInference::new().with_candidates(
            doc_id,
            vec![
                candidate(NodeType::KeyMessage, "valid", 0.9),
                candidate(NodeType::UnmetNeed, "out of range", 1.5),
            ],
        ));
        let pipeline = pipeline(&store, mock, Arc::new(AlwaysLiveGate));

        let report = pipeline.ingest_document(document(doc_id)).await.unwrap();
        assert_eq!(report.nodes_extracted, 1);
        assert_eq!(report.nodes_skipped, 1);
        assert_eq!(store.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_embedding_outage_skips_candidates_fail_closed() {
        let store = InMemoryStore::new();
        let doc_id = Uuid::new_v4();
        let mock = Arc::new(MockInference::new().with_candidates(
            doc_id,
            vec![
                candidate(NodeType::KeyMessage, "one", 0.9),
                candidate(NodeType::UnmetNeed, "two", 0.8),
            ],
        ));
        mock.set_fail_embeddings(true);
        let pipeline = pipeline(&store, mock, Arc::new(AlwaysLiveGate));

        let report = pipeline.ingest_document(document(doc_id)).await.unwrap();
        assert_eq!(report.nodes_extracted, 0);
        assert_eq!(report.nodes_skipped, 2);
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_persists_nothing() {
        let store = InMemoryStore::new();
        // No scripted candidates: the mock reports an inference error.
        let mock = Arc::new(MockInference::new());
        let pipeline = pipeline(&store, mock, Arc::new(AlwaysLiveGate));

        let err = pipeline
            .ingest_document(document(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_deleted_document_rejected_before_extraction() {
        let store = InMemoryStore::new();
        let doc_id = Uuid::new_v4();
        let gate = Arc::new(MockDocumentGate::new());
        gate.mark_deleted(doc_id);
        let mock = Arc::new(MockInference::new());
        let pipeline = pipeline(&store, mock, gate);

        let err = pipeline.ingest_document(document(doc_id)).await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(id) if id == doc_id));
    }

    /// Extraction backend that deletes the document as a side effect,
    /// simulating a deletion racing the batch.
    struct DeletingExtraction {
        candidates: Vec<NodeCandidateProposal>,
        gate: Arc<MockDocumentGate>,
    }

    #[async_trait]
    impl CandidateExtractionBackend for DeletingExtraction {
        async fn extract(&self, doc: &DocumentInput) -> Result<Vec<NodeCandidateProposal>> {
            self.gate.mark_deleted(doc.document_id);
            Ok(self.candidates.clone())
        }
    }

    #[tokio::test]
    async fn test_mid_batch_deletion_rolls_back_created_nodes() {
        let store = InMemoryStore::new();
        let doc_id = Uuid::new_v4();
        let gate = Arc::new(MockDocumentGate::new());
        let mock = Arc::new(MockInference::new());

        let dedup = Arc::new(DedupService::new(
            Arc::new(store.nodes()),
            Arc::new(store.embeddings()),
            mock.clone(),
            DedupConfig::default(),
        ));
        let inference = Arc::new(RelationInferenceEngine::new(
            Arc::new(store.nodes()),
            Arc::new(store.relations()),
            mock,
            InferenceEngineConfig::default(),
        ));
        let extraction = Arc::new(DeletingExtraction {
            candidates: vec![
                candidate(NodeType::KeyMessage, "doomed message", 0.9),
                candidate(NodeType::PatientTension, "doomed tension", 0.8),
            ],
            gate: gate.clone(),
        });
        let pipeline =
            IngestPipeline::new(extraction, dedup, inference, Arc::new(store.nodes()), gate);

        let err = pipeline.ingest_document(document(doc_id)).await.unwrap_err();
        assert!(matches!(err, Error::BatchCancelled(id) if id == doc_id));
        // Every node the batch created was rolled back.
        assert_eq!(store.node_count().await, 0);
        assert_eq!(store.relation_count().await, 0);
    }
}
