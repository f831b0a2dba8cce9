//! Relation classification between node pairs.
//!
//! Builds the prompt handed to the inference collaborator for one ordered
//! node pair and parses its line-oriented verdict back into a typed
//! proposal. Parsing is lenient about casing and surrounding prose but
//! strict about the relation type: a verdict outside the eligible set for
//! the pair is treated as no relation.

use brandgraph_core::{KnowledgeNode, RelationProposal, RelationType};

/// Generates the prompt for classifying the relationship between two nodes.
pub fn relation_prompt(from: &KnowledgeNode, to: &KnowledgeNode, eligible: &[RelationType]) -> String {
    let eligible_list = eligible
        .iter()
        .map(|t| t.as_str().to_uppercase())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Judge whether a directed relationship holds between these two pieces of pharmaceutical brand knowledge.

Source ({from_type}): {from_text}

Target ({to_type}): {to_text}

Allowed relationship types for this pair: {eligible_list}
- ADDRESSES: source speaks to or resolves the target concern
- SUPPORTS: source provides evidence for the target claim
- CONTRADICTS: source conflicts with the target
- TRIGGERS: source causes or precipitates the target
- INFLUENCES: source shifts the target attitude or behavior
- RESONATES: source emotionally aligns with the target

If none of the allowed types holds, answer NONE.

Respond in the format:
RELATION: <type or NONE>
STRENGTH: <0.0-1.0>
CONTEXT: <one sentence explaining why the relation holds>
"#,
        from_type = from.node_type,
        from_text = from.text,
        to_type = to.node_type,
        to_text = to.text,
        eligible_list = eligible_list,
    )
}

/// System prompt for relation classification.
pub const RELATION_SYSTEM_PROMPT: &str =
    "You are a pharmaceutical brand strategist mapping how brand messages, clinical \
     evidence, and patient/HCP insights relate. Answer only in the requested format.";

/// Parses an inference response into a relation proposal.
///
/// Returns `None` when the model answered NONE, when no RELATION line could
/// be found, or when the named type is not in `eligible` for this pair.
pub fn parse_relation_response(
    response: &str,
    eligible: &[RelationType],
) -> Option<RelationProposal> {
    let mut relation_type: Option<RelationType> = None;
    let mut strength: Option<f32> = None;
    let mut context = String::new();

    for line in response.lines() {
        let line = line.trim();
        let lower = line.to_lowercase();
        if let Some(rest) = lower.strip_prefix("relation:") {
            let value = rest.trim();
            if value.starts_with("none") {
                return None;
            }
            relation_type = value
                .split_whitespace()
                .next()
                .and_then(|v| v.parse::<RelationType>().ok());
        } else if let Some(rest) = lower.strip_prefix("strength:") {
            strength = rest.trim().parse::<f32>().ok();
        } else if lower.starts_with("context:") {
            // "context:" is pure ASCII, so the prefix is 8 bytes in the
            // original line too; keep the explanation's original casing.
            context = line.get("context:".len()..).unwrap_or("").trim().to_string();
        }
    }

    let relation_type = relation_type?;
    if !eligible.contains(&relation_type) {
        return None;
    }

    Some(RelationProposal {
        relation_type,
        strength: strength.unwrap_or(0.0).clamp(0.0, 1.0),
        context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandgraph_core::{new_v7, NodeType, SourceRef};
    use chrono::Utc;
    use uuid::Uuid;

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

    #[test]
    fn test_prompt_contains_both_texts_and_eligible_types() {
        let from = node(NodeType::KeyMessage, "Once-daily dosing fits busy lives");
        let to = node(NodeType::PatientTension, "Patients fear complex regimens");
        let prompt = relation_prompt(&from, &to, &[RelationType::Addresses, RelationType::Resonates]);

        assert!(prompt.contains("Once-daily dosing fits busy lives"));
        assert!(prompt.contains("Patients fear complex regimens"));
        assert!(prompt.contains("ADDRESSES, RESONATES"));
        assert!(prompt.contains("key_message"));
    }

    #[test]
    fn test_parse_well_formed_response() {
        let response = "RELATION: addresses\nSTRENGTH: 0.8\nCONTEXT: The message directly resolves the fear.";
        let proposal =
            parse_relation_response(response, &[RelationType::Addresses]).unwrap();
        assert_eq!(proposal.relation_type, RelationType::Addresses);
        assert_eq!(proposal.strength, 0.8);
        assert_eq!(proposal.context, "The message directly resolves the fear.");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let response = "Relation: CONTRADICTS\nStrength: 0.65\nContext: Belief conflicts with claim.";
        let proposal =
            parse_relation_response(response, &[RelationType::Contradicts]).unwrap();
        assert_eq!(proposal.relation_type, RelationType::Contradicts);
    }

    #[test]
    fn test_parse_none_returns_no_proposal() {
        let response = "RELATION: NONE\nSTRENGTH: 0.0\nCONTEXT: unrelated";
        assert!(parse_relation_response(response, &RelationType::ALL).is_none());
    }

    #[test]
    fn test_parse_ineligible_type_is_dropped() {
        let response = "RELATION: supports\nSTRENGTH: 0.9\nCONTEXT: looks supportive";
        assert!(parse_relation_response(response, &[RelationType::Addresses]).is_none());
    }

    #[test]
    fn test_parse_clamps_strength() {
        let response = "RELATION: supports\nSTRENGTH: 1.7\nCONTEXT: overconfident";
        let proposal = parse_relation_response(response, &[RelationType::Supports]).unwrap();
        assert_eq!(proposal.strength, 1.0);
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(parse_relation_response("no structure here", &RelationType::ALL).is_none());
        assert!(parse_relation_response("", &RelationType::ALL).is_none());
    }

    #[test]
    fn test_parse_missing_strength_defaults_to_zero() {
        let response = "RELATION: triggers\nCONTEXT: tension precipitates burden";
        let proposal = parse_relation_response(response, &[RelationType::Triggers]).unwrap();
        assert_eq!(proposal.strength, 0.0);
    }
}
