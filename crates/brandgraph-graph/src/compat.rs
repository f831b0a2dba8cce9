//! Node-type compatibility table for relationship inference.
//!
//! For each ordered `(from, to)` node-type pair, lists the relation types
//! the inference collaborator may propose. Pairs not listed are ineligible
//! and never sent to the collaborator, which is what bounds the pair scan.

use brandgraph_core::{NodeType, RelationType};

use NodeType::*;
use RelationType::*;

/// Relation types eligible for an ordered `(from, to)` node-type pair.
///
/// Unlisted pairs return the empty slice.
pub fn eligible_relations(from: NodeType, to: NodeType) -> &'static [RelationType] {
    match (from, to) {
        // Brand pillars speaking to patient insights
        (KeyMessage, PatientTension) => &[Addresses, Resonates],
        (KeyMessage, UnmetNeed) => &[Addresses],
        (KeyMessage, PatientMotivation) => &[Resonates],
        (KeyMessage, PatientBelief) => &[Addresses, Contradicts],
        (KeyMessage, JourneyInsight) => &[Addresses],
        (ValueProposition, PatientTension) => &[Addresses, Resonates],
        (ValueProposition, UnmetNeed) => &[Addresses],
        (ValueProposition, PatientMotivation) => &[Resonates],

        // Brand pillars speaking to HCP insights
        (KeyMessage, PrescribingDriver) => &[Influences, Resonates],
        (KeyMessage, ClinicalConcern) => &[Addresses],
        (ValueProposition, PrescribingDriver) => &[Influences, Resonates],
        (ValueProposition, ClinicalConcern) => &[Addresses],
        (ProofPoint, ClinicalConcern) => &[Addresses],
        (ProofPoint, PrescribingDriver) => &[Influences],

        // Evidence chain inside the brand pillars
        (ProofPoint, ValueProposition) => &[Supports],
        (ProofPoint, KeyMessage) => &[Supports],
        (ProofPoint, Differentiator) => &[Supports],
        (ProofPoint, PatientBelief) => &[Contradicts],

        // Patient beliefs pushing back on messaging
        (PatientBelief, KeyMessage) => &[Contradicts],
        (PatientBelief, ValueProposition) => &[Contradicts],

        // Patient insight dynamics
        (PatientTension, SymptomBurden) => &[Triggers],
        (PatientTension, JourneyInsight) => &[Influences],
        (PatientMotivation, JourneyInsight) => &[Influences],
        (SymptomBurden, PatientTension) => &[Triggers],
        (SymptomBurden, UnmetNeed) => &[Triggers],
        (JourneyInsight, PatientTension) => &[Triggers],
        (JourneyInsight, UnmetNeed) => &[Triggers],

        // Disease knowledge shaping the landscape
        (Epidemiology, UnmetNeed) => &[Supports],
        (Epidemiology, MarketBarrier) => &[Influences],
        (TreatmentLandscape, UnmetNeed) => &[Triggers, Influences],
        (TreatmentLandscape, PrescribingDriver) => &[Influences],

        // HCP insight dynamics
        (ClinicalConcern, PrescribingDriver) => &[Influences],
        (PracticeConstraint, PrescribingDriver) => &[Influences],

        // Market position
        (Differentiator, CompetitorPosition) => &[Contradicts, Influences],
        (Differentiator, MarketBarrier) => &[Addresses],
        (Differentiator, PrescribingDriver) => &[Influences],
        (CompetitorPosition, MarketBarrier) => &[Influences],
        (CompetitorPosition, PrescribingDriver) => &[Influences],
        (MarketBarrier, TreatmentLandscape) => &[Influences],

        _ => &[],
    }
}

/// True when at least one relation type is eligible for the pair.
pub fn is_eligible(from: NodeType, to: NodeType) -> bool {
    !eligible_relations(from, to).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_message_to_patient_tension() {
        let eligible = eligible_relations(KeyMessage, PatientTension);
        assert!(eligible.contains(&Addresses));
        assert!(eligible.contains(&Resonates));
    }

    #[test]
    fn test_proof_point_supports_value_proposition() {
        assert_eq!(eligible_relations(ProofPoint, ValueProposition), &[Supports]);
    }

    #[test]
    fn test_patient_belief_contradicts_key_message() {
        assert_eq!(eligible_relations(PatientBelief, KeyMessage), &[Contradicts]);
    }

    #[test]
    fn test_patient_tension_triggers_symptom_burden() {
        assert_eq!(eligible_relations(PatientTension, SymptomBurden), &[Triggers]);
    }

    #[test]
    fn test_same_type_pairs_are_ineligible() {
        for t in NodeType::ALL {
            assert!(
                !is_eligible(t, t),
                "same-type pair should be ineligible: {}",
                t
            );
        }
    }

    #[test]
    fn test_unlisted_pair_is_ineligible() {
        assert!(!is_eligible(Epidemiology, PatientMotivation));
        assert!(!is_eligible(MarketBarrier, KeyMessage));
    }

    #[test]
    fn test_eligible_sets_draw_only_from_the_six_types() {
        for from in NodeType::ALL {
            for to in NodeType::ALL {
                for r in eligible_relations(from, to) {
                    assert!(RelationType::ALL.contains(r));
                }
            }
        }
    }

    #[test]
    fn test_table_has_meaningful_coverage() {
        let eligible_pairs = NodeType::ALL
            .iter()
            .flat_map(|from| NodeType::ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| is_eligible(*from, *to))
            .count();
        // The table bounds fan-out: well below the full 17x17 grid, well
        // above a trivial handful.
        assert!(eligible_pairs > 20);
        assert!(eligible_pairs < 100);
    }
}
