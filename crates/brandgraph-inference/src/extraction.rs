//! Candidate extraction prompt construction and response parsing.
//!
//! The extraction collaborator receives one document and returns candidate
//! knowledge nodes as JSON. The model is asked for a bare array; responses
//! wrapped in a `{"candidates": [...]}` object are accepted too, since
//! JSON-mode models frequently add the envelope.

use serde_json::Value;
use tracing::warn;

use brandgraph_core::{DocumentInput, NodeCandidateProposal, NodeType, Result};

/// System prompt for candidate extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You extract structured knowledge from pharmaceutical brand documents. \
     Respond with JSON only.";

/// Generates the extraction prompt for one document.
pub fn extraction_prompt(document: &DocumentInput) -> String {
    let type_list = NodeType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Extract every distinct piece of brand knowledge from this {kind} document.

Allowed node types: {type_list}

For each piece of knowledge return an object:
{{"node_type": "<type>", "text": "<full statement>", "summary": "<short label>", "segment": "<audience segment or omit>", "journey_stage": "<stage or omit>", "source_quote": "<verbatim supporting quote>", "confidence": <0.0-1.0>}}

Respond with a JSON array of these objects and nothing else.

Document:
{text}
"#,
        kind = document.kind,
        type_list = type_list,
        text = document.text,
    )
}

/// Parses the extraction response into candidate proposals.
///
/// Individually malformed entries are dropped with a warning — one bad
/// candidate must not abort the rest of the batch.
pub fn parse_extraction_response(response: &str) -> Result<Vec<NodeCandidateProposal>> {
    let value: Value = serde_json::from_str(response.trim())?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("candidates") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(brandgraph_core::Error::Inference(
                    "extraction response is neither an array nor a candidates object".to_string(),
                ))
            }
        },
        _ => {
            return Err(brandgraph_core::Error::Inference(
                "extraction response is not JSON array".to_string(),
            ))
        }
    };

    let mut proposals = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<NodeCandidateProposal>(entry) {
            Ok(proposal) => proposals.push(proposal),
            Err(e) => warn!(error = %e, "Dropping malformed extraction candidate"),
        }
    }
    Ok(proposals)
}
