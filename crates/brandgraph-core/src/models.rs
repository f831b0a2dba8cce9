//! Core data model for the per-brand knowledge graph.
//!
//! Nodes and relations are the only persisted entities. Everything else in
//! this module is a request/response value passed between components by
//! copy — workers never hold references into a store's internal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Embedding vector type (shared with pgvector).
pub use pgvector::Vector;

// =============================================================================
// FIXED ENUMERATIONS
// =============================================================================

/// The five families a node type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeFamily {
    BrandPillar,
    DiseaseKnowledge,
    PatientInsight,
    HcpInsight,
    Market,
}

/// Typed knowledge node categories.
///
/// The enumeration is closed: values outside it are unrepresentable, which
/// is what enforces invariant (d) at the type level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    // Brand pillars
    KeyMessage,
    ValueProposition,
    Differentiator,
    ProofPoint,
    // Disease knowledge
    Epidemiology,
    SymptomBurden,
    TreatmentLandscape,
    UnmetNeed,
    // Patient insights
    PatientMotivation,
    PatientBelief,
    PatientTension,
    JourneyInsight,
    // HCP insights
    PrescribingDriver,
    ClinicalConcern,
    PracticeConstraint,
    // Market
    CompetitorPosition,
    MarketBarrier,
}

impl NodeType {
    /// All node types, in declaration order.
    pub const ALL: [NodeType; 17] = [
        NodeType::KeyMessage,
        NodeType::ValueProposition,
        NodeType::Differentiator,
        NodeType::ProofPoint,
        NodeType::Epidemiology,
        NodeType::SymptomBurden,
        NodeType::TreatmentLandscape,
        NodeType::UnmetNeed,
        NodeType::PatientMotivation,
        NodeType::PatientBelief,
        NodeType::PatientTension,
        NodeType::JourneyInsight,
        NodeType::PrescribingDriver,
        NodeType::ClinicalConcern,
        NodeType::PracticeConstraint,
        NodeType::CompetitorPosition,
        NodeType::MarketBarrier,
    ];

    /// Returns the stored/wire representation of this node type.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::KeyMessage => "key_message",
            NodeType::ValueProposition => "value_proposition",
            NodeType::Differentiator => "differentiator",
            NodeType::ProofPoint => "proof_point",
            NodeType::Epidemiology => "epidemiology",
            NodeType::SymptomBurden => "symptom_burden",
            NodeType::TreatmentLandscape => "treatment_landscape",
            NodeType::UnmetNeed => "unmet_need",
            NodeType::PatientMotivation => "patient_motivation",
            NodeType::PatientBelief => "patient_belief",
            NodeType::PatientTension => "patient_tension",
            NodeType::JourneyInsight => "journey_insight",
            NodeType::PrescribingDriver => "prescribing_driver",
            NodeType::ClinicalConcern => "clinical_concern",
            NodeType::PracticeConstraint => "practice_constraint",
            NodeType::CompetitorPosition => "competitor_position",
            NodeType::MarketBarrier => "market_barrier",
        }
    }

    /// The family this node type belongs to.
    pub fn family(&self) -> NodeFamily {
        match self {
            NodeType::KeyMessage
            | NodeType::ValueProposition
            | NodeType::Differentiator
            | NodeType::ProofPoint => NodeFamily::BrandPillar,
            NodeType::Epidemiology
            | NodeType::SymptomBurden
            | NodeType::TreatmentLandscape
            | NodeType::UnmetNeed => NodeFamily::DiseaseKnowledge,
            NodeType::PatientMotivation
            | NodeType::PatientBelief
            | NodeType::PatientTension
            | NodeType::JourneyInsight => NodeFamily::PatientInsight,
            NodeType::PrescribingDriver
            | NodeType::ClinicalConcern
            | NodeType::PracticeConstraint => NodeFamily::HcpInsight,
            NodeType::CompetitorPosition | NodeType::MarketBarrier => NodeFamily::Market,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NodeType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Validation(format!("unknown node type: {}", s)))
    }
}

/// Typed, directed relation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Addresses,
    Supports,
    Contradicts,
    Triggers,
    Influences,
    Resonates,
}

impl RelationType {
    /// All relation types, in declaration order.
    pub const ALL: [RelationType; 6] = [
        RelationType::Addresses,
        RelationType::Supports,
        RelationType::Contradicts,
        RelationType::Triggers,
        RelationType::Influences,
        RelationType::Resonates,
    ];

    /// Returns the stored/wire representation of this relation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Addresses => "addresses",
            RelationType::Supports => "supports",
            RelationType::Contradicts => "contradicts",
            RelationType::Triggers => "triggers",
            RelationType::Influences => "influences",
            RelationType::Resonates => "resonates",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RelationType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Validation(format!("unknown relation type: {}", s)))
    }
}

/// Whether a node/relation originated from automated inference or a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Llm,
    User,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Llm => "llm",
            Provenance::User => "user",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "llm" => Ok(Provenance::Llm),
            "user" => Ok(Provenance::User),
            _ => Err(Error::Validation(format!("unknown provenance: {}", s))),
        }
    }
}

/// Document categories supplied by the external document processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Messaging,
    ClinicalLiterature,
    InterviewTranscript,
    CompetitiveIntel,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Messaging => "messaging",
            DocumentKind::ClinicalLiterature => "clinical_literature",
            DocumentKind::InterviewTranscript => "interview_transcript",
            DocumentKind::CompetitiveIntel => "competitive_intel",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// NODES
// =============================================================================

/// Provenance pointer from a node back to an originating document.
///
/// A node accumulates one SourceRef per document it was extracted or merged
/// from; the dedup service appends, never replaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

/// A single extracted piece of brand/clinical/patient/HCP/market knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: Uuid,
    pub brand_id: i64,
    pub node_type: NodeType,
    pub text: String,
    /// Short display label, derived from `text` when not supplied.
    pub summary: Option<String>,
    pub segment: Option<String>,
    pub journey_stage: Option<String>,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub verified_by_user: bool,
    pub created_at: DateTime<Utc>,
}

/// Derive a short display summary from node text: first sentence, capped.
pub fn derive_summary(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let sentence = first_line
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or(first_line)
        .trim();
    if sentence.chars().count() <= crate::defaults::SUMMARY_MAX_CHARS {
        sentence.to_string()
    } else {
        let truncated: String = sentence
            .chars()
            .take(crate::defaults::SUMMARY_MAX_CHARS - 1)
            .collect();
        format!("{}…", truncated.trim_end())
    }
}

/// Request for creating a new node.
#[derive(Debug, Clone)]
pub struct CreateNodeRequest {
    pub brand_id: i64,
    pub node_type: NodeType,
    pub text: String,
    pub summary: Option<String>,
    pub segment: Option<String>,
    pub journey_stage: Option<String>,
    pub source: SourceRef,
    pub confidence: f32,
}

impl CreateNodeRequest {
    /// Validate the request. Rejections are total: nothing is applied.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::Validation(format!(
                "node text must be non-empty (brand_id={})",
                self.brand_id
            )));
        }
        validate_unit_interval("confidence", self.confidence, self.brand_id)?;
        Ok(())
    }
}

/// Filters for listing nodes. Results are ordered by creation time.
#[derive(Debug, Clone)]
pub struct ListNodesRequest {
    pub brand_id: i64,
    pub node_type: Option<NodeType>,
    pub segment: Option<String>,
}

impl ListNodesRequest {
    pub fn for_brand(brand_id: i64) -> Self {
        Self {
            brand_id,
            node_type: None,
            segment: None,
        }
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// A typed, directed, strength-weighted edge between two nodes.
///
/// Relations are immutable once created; the only mutation is deletion
/// (explicit or by endpoint cascade).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRelation {
    pub id: Uuid,
    pub brand_id: i64,
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    pub relation_type: RelationType,
    pub strength: f32,
    pub context: String,
    pub inferred_by: Provenance,
    pub created_at: DateTime<Utc>,
}

/// Request for creating a new relation.
#[derive(Debug, Clone)]
pub struct CreateRelationRequest {
    pub brand_id: i64,
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    pub relation_type: RelationType,
    pub strength: f32,
    pub context: String,
    pub inferred_by: Provenance,
}

impl CreateRelationRequest {
    /// Validate the request fields that need no store access.
    ///
    /// Brand isolation (both endpoints share `brand_id`) is checked by the
    /// repository, which must look the endpoints up anyway.
    pub fn validate(&self) -> Result<()> {
        if self.from_node_id == self.to_node_id {
            return Err(Error::Validation(format!(
                "self-loop rejected: from_node_id == to_node_id ({})",
                self.from_node_id
            )));
        }
        validate_unit_interval("strength", self.strength, self.brand_id)?;
        Ok(())
    }
}

/// Filters for listing relations. Results are ordered by creation time.
#[derive(Debug, Clone)]
pub struct ListRelationsRequest {
    pub brand_id: i64,
    pub relation_type: Option<RelationType>,
}

impl ListRelationsRequest {
    pub fn for_brand(brand_id: i64) -> Self {
        Self {
            brand_id,
            relation_type: None,
        }
    }

    pub fn with_relation_type(mut self, relation_type: RelationType) -> Self {
        self.relation_type = Some(relation_type);
        self
    }
}

// =============================================================================
// COLLABORATOR PAYLOADS
// =============================================================================

/// Candidate node proposed by the extraction collaborator for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCandidateProposal {
    pub node_type: NodeType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journey_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_quote: Option<String>,
    pub confidence: f32,
}

/// Relation proposed by the pair-inference collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationProposal {
    pub relation_type: RelationType,
    pub strength: f32,
    pub context: String,
}

/// One document handed to the ingestion pipeline by the document processor.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub document_id: Uuid,
    pub brand_id: i64,
    pub kind: DocumentKind,
    pub text: String,
}

/// Outcome of one document's extraction + inference batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Candidates that became new nodes.
    pub nodes_extracted: usize,
    /// Candidates merged into existing nodes by dedup.
    pub nodes_merged: usize,
    /// Candidates dropped (validation failure or fail-closed embedding error).
    pub nodes_skipped: usize,
    /// Relations committed by the inference engine for this batch.
    pub relationships_inferred: usize,
}

fn validate_unit_interval(field: &str, value: f32, brand_id: i64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::Validation(format!(
            "{} must be within [0, 1], got {} (brand_id={})",
            field, value, brand_id
        )));
    }
    Ok(())
}
