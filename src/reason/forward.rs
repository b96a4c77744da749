//! Forward chaining: apply rules to existing facts until fixpoint.
//!
//! Each round applies every rule in insertion order, substituting each
//! consistent premise binding into the conclusion and materializing it
//! through the store's dedup-aware adds. A round that derives nothing new is
//! the fixpoint; `max_inferences` and the engine's `max_iterations` bound
//! the loop on rule sets that converge slowly or not at all.

use crate::atom::{AtomContent, AtomId};
use crate::error::ThothResult;
use crate::pattern::{Bindings, Pattern, PatternMatcher};
use crate::space::AtomSpace;
use crate::truth::TruthValue;

use super::engine::ReasoningEngine;
use super::InferenceRecord;

impl ReasoningEngine {
    /// Run forward chaining until fixpoint or a cap is hit.
    ///
    /// Returns the inference records produced by this call, newest last;
    /// the same records are appended to the engine's running log. Derived
    /// confidence is the rule's confidence times the weakest premise
    /// confidence; derived strength is the confidence-weighted average of
    /// premise strengths. Conclusions already present in the store are
    /// skipped without a record.
    pub fn forward_chain(&mut self, max_inferences: usize) -> ThothResult<Vec<InferenceRecord>> {
        let space = self.space_arc();
        let matcher = PatternMatcher::new(space.as_ref());
        let min_confidence = self.config().min_confidence;
        let max_iterations = self.config().max_iterations;

        let mut batch: Vec<InferenceRecord> = Vec::new();
        let mut rounds = 0usize;

        'chaining: while rounds < max_iterations {
            rounds += 1;
            let mut new_this_round = 0usize;

            for rule in self.rules() {
                for solution in matcher.match_many(&rule.premises)? {
                    if batch.len() >= max_inferences {
                        break 'chaining;
                    }

                    let mut premise_tvs = Vec::with_capacity(solution.matched.len());
                    for &source in &solution.matched {
                        premise_tvs.push(space.get(source)?.tv);
                    }
                    let tv = derive_tv(rule.confidence, &premise_tvs);
                    if tv.confidence < min_confidence {
                        continue;
                    }

                    let Some(resulting) =
                        materialize_conclusion(&space, &rule.conclusion, &solution.bindings, tv)?
                    else {
                        continue;
                    };
                    batch.push(InferenceRecord {
                        resulting_atom_id: Some(resulting),
                        rule_name: rule.name.clone(),
                        source_atom_ids: solution.matched.clone(),
                        derived_confidence: tv.confidence,
                    });
                    new_this_round += 1;
                }
            }

            if new_this_round == 0 {
                tracing::debug!(rounds, "forward chaining reached fixpoint");
                break;
            }
        }

        tracing::info!(inferred = batch.len(), rounds, "forward chaining finished");
        self.push_log(&batch);
        Ok(batch)
    }
}

/// Truth value of a derivation from its premises.
fn derive_tv(rule_confidence: f32, premises: &[TruthValue]) -> TruthValue {
    let min_conf = premises
        .iter()
        .map(|tv| tv.confidence)
        .fold(f32::INFINITY, f32::min);
    let min_conf = if min_conf.is_finite() { min_conf } else { 1.0 };

    let weight: f32 = premises.iter().map(|tv| tv.confidence).sum();
    let strength = if weight > 0.0 {
        premises
            .iter()
            .map(|tv| tv.strength * tv.confidence)
            .sum::<f32>()
            / weight
    } else if premises.is_empty() {
        1.0
    } else {
        premises.iter().map(|tv| tv.strength).sum::<f32>() / premises.len() as f32
    };

    TruthValue::new(strength, rule_confidence * min_conf)
}

/// Substitute bindings into a conclusion and add the resulting atom.
///
/// Returns `None` when the conclusion resolves to an atom that already
/// exists (no new derivation) or cannot be fully grounded. Nested conclusion
/// shapes are materialized bottom-up through dedup-aware adds.
fn materialize_conclusion(
    space: &AtomSpace,
    conclusion: &Pattern,
    bindings: &Bindings,
    tv: TruthValue,
) -> ThothResult<Option<AtomId>> {
    match conclusion {
        // A literal or bound-variable conclusion names an atom that already
        // exists; nothing new is derived.
        Pattern::Atom(_) | Pattern::Variable(_) => Ok(None),
        Pattern::Shape {
            atom_type,
            name,
            outgoing,
        } => {
            let Some(atom_type) = atom_type else {
                return Ok(None);
            };
            match (name, outgoing) {
                (Some(node_name), None) => {
                    let content = AtomContent::Node {
                        name: node_name.clone(),
                    };
                    if space.find_exact(atom_type, &content).is_some() {
                        return Ok(None);
                    }
                    Ok(Some(space.add_node(
                        atom_type.clone(),
                        node_name.clone(),
                        Some(tv),
                    )?))
                }
                (None, Some(slots)) => {
                    let mut ids = Vec::with_capacity(slots.len());
                    for slot in slots {
                        match resolve_slot(space, slot, bindings)? {
                            Some(id) => ids.push(id),
                            None => return Ok(None),
                        }
                    }
                    let content = AtomContent::Link {
                        outgoing: ids.clone(),
                    };
                    if space.find_exact(atom_type, &content).is_some() {
                        return Ok(None);
                    }
                    Ok(Some(space.add_link(atom_type.clone(), &ids, Some(tv))?))
                }
                _ => Ok(None),
            }
        }
    }
}

/// Resolve one conclusion slot to an atom id, creating nested sub-atoms
/// through dedup-aware adds where the slot is itself a shape.
fn resolve_slot(
    space: &AtomSpace,
    slot: &Pattern,
    bindings: &Bindings,
) -> ThothResult<Option<AtomId>> {
    match slot {
        Pattern::Atom(id) => Ok(space.contains(*id).then_some(*id)),
        Pattern::Variable(var) => Ok(bindings
            .get(&var.name)
            .copied()
            .filter(|id| space.contains(*id))),
        Pattern::Shape {
            atom_type,
            name,
            outgoing,
        } => {
            let Some(atom_type) = atom_type else {
                return Ok(None);
            };
            match (name, outgoing) {
                (Some(node_name), None) => Ok(Some(space.add_node(
                    atom_type.clone(),
                    node_name.clone(),
                    None,
                )?)),
                (None, Some(slots)) => {
                    let mut ids = Vec::with_capacity(slots.len());
                    for inner in slots {
                        match resolve_slot(space, inner, bindings)? {
                            Some(id) => ids.push(id),
                            None => return Ok(None),
                        }
                    }
                    Ok(Some(space.add_link(atom_type.clone(), &ids, None)?))
                }
                _ => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::types;
    use crate::reason::{ReasonerConfig, Rule};
    use std::sync::Arc;

    fn transitivity_rule() -> Rule {
        Rule::new(
            "inheritance_transitivity",
            vec![
                Pattern::link(
                    types::INHERITANCE,
                    vec![Pattern::var("X"), Pattern::var("Y")],
                ),
                Pattern::link(
                    types::INHERITANCE,
                    vec![Pattern::var("Y"), Pattern::var("Z")],
                ),
            ],
            Pattern::link(
                types::INHERITANCE,
                vec![Pattern::var("X"), Pattern::var("Z")],
            ),
        )
        .with_confidence(0.9)
    }

    fn chain_engine() -> ReasoningEngine {
        let space = Arc::new(AtomSpace::new());
        space
            .add_inheritance("ML", "AI", Some(TruthValue::new(1.0, 0.8)))
            .unwrap();
        space
            .add_inheritance("DL", "ML", Some(TruthValue::new(1.0, 0.6)))
            .unwrap();
        let mut engine = ReasoningEngine::new(space);
        engine.add_rule(transitivity_rule()).unwrap();
        engine
    }

    #[test]
    fn transitivity_derives_new_link() {
        let mut engine = chain_engine();
        let records = engine.forward_chain(10).unwrap();
        assert_eq!(records.len(), 1);

        let dl = engine.space().find_by_name("DL")[0];
        let ai = engine.space().find_by_name("AI")[0];
        let derived = engine
            .space()
            .find_exact(
                types::INHERITANCE,
                &AtomContent::Link {
                    outgoing: vec![dl, ai],
                },
            )
            .expect("Inheritance(DL, AI) should exist");
        assert_eq!(records[0].resulting_atom_id, Some(derived));
        assert_eq!(records[0].rule_name, "inheritance_transitivity");
        assert_eq!(records[0].source_atom_ids.len(), 2);
        // confidence = 0.9 × min(0.8, 0.6)
        assert!((records[0].derived_confidence - 0.54).abs() < 1e-6);
        assert!((engine.space().get(derived).unwrap().tv.confidence - 0.54).abs() < 1e-6);
    }

    #[test]
    fn second_run_is_fixpoint() {
        let mut engine = chain_engine();
        let first = engine.forward_chain(100).unwrap();
        assert!(!first.is_empty());
        let second = engine.forward_chain(100).unwrap();
        assert!(second.is_empty());
        // The log keeps the first batch.
        assert_eq!(engine.log().len(), first.len());
    }

    #[test]
    fn derived_strength_is_weighted_average() {
        let space = Arc::new(AtomSpace::new());
        space
            .add_inheritance("A", "B", Some(TruthValue::new(1.0, 0.8)))
            .unwrap();
        space
            .add_inheritance("B", "C", Some(TruthValue::new(0.5, 0.2)))
            .unwrap();
        let mut engine = ReasoningEngine::new(space);
        engine.add_rule(transitivity_rule()).unwrap();

        let records = engine.forward_chain(10).unwrap();
        assert_eq!(records.len(), 1);
        let derived = engine
            .space()
            .get(records[0].resulting_atom_id.unwrap())
            .unwrap();
        // strength = (1.0·0.8 + 0.5·0.2) / 1.0 = 0.9
        assert!((derived.tv.strength - 0.9).abs() < 1e-6);
    }

    #[test]
    fn min_confidence_suppresses_weak_derivations() {
        let space = Arc::new(AtomSpace::new());
        space
            .add_inheritance("A", "B", Some(TruthValue::new(1.0, 0.05)))
            .unwrap();
        space
            .add_inheritance("B", "C", Some(TruthValue::new(1.0, 0.9)))
            .unwrap();
        let mut engine = ReasoningEngine::new(space);
        engine.add_rule(transitivity_rule()).unwrap();

        // 0.9 × 0.05 = 0.045 < default 0.1
        let records = engine.forward_chain(10).unwrap();
        assert!(records.is_empty());
        assert_eq!(engine.space().find_by_type(types::INHERITANCE).len(), 2);
    }

    #[test]
    fn max_inferences_caps_output() {
        let space = Arc::new(AtomSpace::new());
        for (child, parent) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")] {
            space.add_inheritance(child, parent, None).unwrap();
        }
        let mut engine = ReasoningEngine::new(space);
        engine.add_rule(transitivity_rule()).unwrap();

        let records = engine.forward_chain(2).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn max_iterations_bounds_rounds() {
        let space = Arc::new(AtomSpace::new());
        for (child, parent) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")] {
            space.add_inheritance(child, parent, None).unwrap();
        }
        let mut engine = ReasoningEngine::with_config(
            space,
            ReasonerConfig {
                max_iterations: 1,
                min_confidence: 0.0,
            },
        );
        engine.add_rule(transitivity_rule()).unwrap();

        engine.forward_chain(100).unwrap();
        // One round closes single hops only: A→C, B→D, C→E.
        let a = engine.space().find_by_name("A")[0];
        let e = engine.space().find_by_name("E")[0];
        assert!(
            engine
                .space()
                .find_exact(
                    types::INHERITANCE,
                    &AtomContent::Link {
                        outgoing: vec![a, e]
                    }
                )
                .is_none(),
            "A→E needs more than one round"
        );
    }

    #[test]
    fn symmetry_converges_without_oscillating() {
        let space = Arc::new(AtomSpace::new());
        let a = space.add_concept("A", None).unwrap();
        let b = space.add_concept("B", None).unwrap();
        space.add_link(types::SIMILARITY, &[a, b], None).unwrap();

        let mut engine = ReasoningEngine::new(space);
        engine
            .add_rule(Rule::new(
                "similarity_symmetry",
                vec![Pattern::link(
                    types::SIMILARITY,
                    vec![Pattern::var("A"), Pattern::var("B")],
                )],
                Pattern::link(
                    types::SIMILARITY,
                    vec![Pattern::var("B"), Pattern::var("A")],
                ),
            ))
            .unwrap();

        let records = engine.forward_chain(100).unwrap();
        // Exactly one new link: (B, A). The reverse of the derived link is
        // the original and is skipped as existing.
        assert_eq!(records.len(), 1);
        assert_eq!(engine.space().find_by_type(types::SIMILARITY).len(), 2);
    }
}
