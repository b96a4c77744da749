//! Unification-based structural matching against the atom store.
//!
//! Candidates are bounded by the store's type index before any structural
//! work happens; a full scan only occurs for patterns with no type
//! information at all. Matching is exhaustive and deterministic: every
//! compatible candidate is tried and results come back in ascending id order.

use crate::atom::{AtomId, AtomKind};
use crate::error::ThothResult;
use crate::space::AtomSpace;

use super::{Bindings, Pattern};

/// One successful match: the root atom and the variable bindings it induced.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub atom_id: AtomId,
    pub bindings: Bindings,
}

/// One solution of a conjunctive (multi-pattern) match: the combined
/// bindings plus the atom matched for each pattern, in pattern order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConjunctiveMatch {
    pub bindings: Bindings,
    pub matched: Vec<AtomId>,
}

/// Read-only structural matcher over one atom store.
///
/// Constructed with an explicit store reference; holds no state of its own
/// and sees every store mutation immediately.
pub struct PatternMatcher<'a> {
    space: &'a AtomSpace,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(space: &'a AtomSpace) -> Self {
        Self { space }
    }

    pub fn space(&self) -> &AtomSpace {
        self.space
    }

    /// Produce all consistent matches of `pattern`, ascending by atom id.
    ///
    /// Zero candidates is an empty list, not an error; a malformed pattern
    /// is rejected with `InvalidPattern` before any traversal.
    pub fn matches(&self, pattern: &Pattern) -> ThothResult<Vec<Match>> {
        pattern.validate()?;
        self.matches_seeded(pattern, &Bindings::new())
    }

    /// Match with pre-existing variable bindings (the conjunctive join and
    /// the reasoner seed partial solutions through here).
    pub(crate) fn matches_seeded(
        &self,
        pattern: &Pattern,
        seed: &Bindings,
    ) -> ThothResult<Vec<Match>> {
        let mut out = Vec::new();
        for id in self.candidates(pattern, seed) {
            let mut working = seed.clone();
            if self.matches_atom(pattern, id, &mut working)? {
                out.push(Match {
                    atom_id: id,
                    bindings: working,
                });
            }
        }
        Ok(out)
    }

    /// Conjunctive match across patterns sharing variables.
    ///
    /// A backtracking join in the given order: each pattern's candidate
    /// bindings are merged against the solutions accumulated so far,
    /// inconsistent merges are rejected, and the search continues across the
    /// remaining patterns. Pattern order affects cost, never results.
    pub fn match_many(&self, patterns: &[Pattern]) -> ThothResult<Vec<ConjunctiveMatch>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        for pattern in patterns {
            pattern.validate()?;
        }

        let mut partials = vec![ConjunctiveMatch {
            bindings: Bindings::new(),
            matched: Vec::new(),
        }];
        for pattern in patterns {
            let mut extended = Vec::new();
            for partial in &partials {
                for m in self.matches_seeded(pattern, &partial.bindings)? {
                    let mut matched = partial.matched.clone();
                    matched.push(m.atom_id);
                    extended.push(ConjunctiveMatch {
                        bindings: m.bindings,
                        matched,
                    });
                }
            }
            if extended.is_empty() {
                return Ok(Vec::new());
            }
            partials = extended;
        }
        Ok(partials)
    }

    /// Candidate atoms for a pattern root, bounded by the type index where
    /// the pattern carries type information.
    fn candidates(&self, pattern: &Pattern, seed: &Bindings) -> Vec<AtomId> {
        match pattern {
            Pattern::Atom(id) => {
                if self.space.contains(*id) {
                    vec![*id]
                } else {
                    Vec::new()
                }
            }
            Pattern::Variable(var) => {
                if let Some(&bound) = seed.get(&var.name) {
                    if self.space.contains(bound) {
                        vec![bound]
                    } else {
                        Vec::new()
                    }
                } else if let Some(constraint) = &var.type_constraint {
                    self.space.find_by_type(constraint)
                } else {
                    self.space.all_ids()
                }
            }
            Pattern::Shape { atom_type, .. } => match atom_type {
                Some(t) => self.space.find_by_type(t),
                None => self.space.all_ids(),
            },
        }
    }

    /// Check one candidate against a pattern, extending `bindings` in place.
    /// On failure the caller discards the working binding set, so partial
    /// extensions never leak into the next candidate.
    fn matches_atom(
        &self,
        pattern: &Pattern,
        id: AtomId,
        bindings: &mut Bindings,
    ) -> ThothResult<bool> {
        match pattern {
            Pattern::Atom(literal) => Ok(*literal == id),
            Pattern::Variable(var) => {
                if let Some(constraint) = &var.type_constraint {
                    let atom = self.space.get(id)?;
                    if &atom.atom_type != constraint {
                        return Ok(false);
                    }
                }
                match bindings.get(&var.name) {
                    Some(&bound) => Ok(bound == id),
                    None => {
                        bindings.insert(var.name.clone(), id);
                        Ok(true)
                    }
                }
            }
            Pattern::Shape {
                atom_type,
                name,
                outgoing,
            } => {
                let atom = self.space.get(id)?;
                if let Some(t) = atom_type {
                    if &atom.atom_type != t {
                        return Ok(false);
                    }
                }
                if let Some(n) = name {
                    if atom.name() != Some(n.as_str()) {
                        return Ok(false);
                    }
                }
                if let Some(slots) = outgoing {
                    if atom.kind() != AtomKind::Link {
                        return Ok(false);
                    }
                    let targets = atom.outgoing().to_vec();
                    if targets.len() != slots.len() {
                        return Ok(false);
                    }
                    for (slot, target) in slots.iter().zip(targets) {
                        if !self.matches_atom(slot, target, bindings)? {
                            return Ok(false);
                        }
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::types;
    use crate::error::ThothError;

    fn inheritance_space() -> AtomSpace {
        let space = AtomSpace::new();
        space.add_inheritance("ML", "AI", None).unwrap();
        space.add_inheritance("DL", "ML", None).unwrap();
        space
    }

    #[test]
    fn literal_pattern_matches_one_atom() {
        let space = AtomSpace::new();
        let id = space.add_concept("AI", None).unwrap();
        let matcher = PatternMatcher::new(&space);

        let matches = matcher.matches(&Pattern::atom(id)).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].atom_id, id);
        assert!(matches[0].bindings.is_empty());
    }

    #[test]
    fn node_shape_matches_by_type_and_name() {
        let space = inheritance_space();
        let matcher = PatternMatcher::new(&space);

        let matches = matcher
            .matches(&Pattern::node(types::CONCEPT, "ML"))
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].atom_id, space.find_by_name("ML")[0]);
    }

    #[test]
    fn variable_slot_binds_candidate() {
        let space = inheritance_space();
        let matcher = PatternMatcher::new(&space);

        let ml = space.find_by_name("ML")[0];
        let pattern = Pattern::link(
            types::INHERITANCE,
            vec![Pattern::atom(ml), Pattern::var("parent")],
        );
        let matches = matcher.matches(&pattern).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].bindings.get("parent"),
            Some(&space.find_by_name("AI")[0])
        );
    }

    #[test]
    fn repeated_variable_must_agree() {
        let space = AtomSpace::new();
        let a = space.add_concept("A", None).unwrap();
        let b = space.add_concept("B", None).unwrap();
        space.add_link(types::SIMILARITY, &[a, a], None).unwrap();
        space.add_link(types::SIMILARITY, &[a, b], None).unwrap();
        let matcher = PatternMatcher::new(&space);

        let pattern = Pattern::link(
            types::SIMILARITY,
            vec![Pattern::var("X"), Pattern::var("X")],
        );
        let matches = matcher.matches(&pattern).unwrap();
        // Only the self-similarity link has both slots equal.
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings.get("X"), Some(&a));
    }

    #[test]
    fn typed_variable_rejects_other_types() {
        let space = AtomSpace::new();
        let c = space.add_concept("thing", None).unwrap();
        space.add_predicate("thing", None).unwrap();
        let matcher = PatternMatcher::new(&space);

        let matches = matcher
            .matches(&Pattern::var_typed("X", types::CONCEPT))
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].atom_id, c);
    }

    #[test]
    fn results_ascend_by_atom_id() {
        let space = AtomSpace::new();
        space.add_concept("C", None).unwrap();
        space.add_concept("A", None).unwrap();
        space.add_concept("B", None).unwrap();
        let matcher = PatternMatcher::new(&space);

        let matches = matcher.matches(&Pattern::of_type(types::CONCEPT)).unwrap();
        let ids: Vec<u64> = matches.iter().map(|m| m.atom_id.get()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn nested_sub_pattern_recurses() {
        let space = AtomSpace::new();
        space
            .add_evaluation("helps", &["AI", "Human"], None)
            .unwrap();
        space.add_evaluation("exists", &["AI"], None).unwrap();
        let matcher = PatternMatcher::new(&space);

        // EvaluationLink(pred, ListLink(x, y)): only the two-argument
        // evaluation goes through a list.
        let pattern = Pattern::link(
            types::EVALUATION,
            vec![
                Pattern::var_typed("pred", types::PREDICATE),
                Pattern::link(types::LIST, vec![Pattern::var("x"), Pattern::var("y")]),
            ],
        );
        let matches = matcher.matches(&pattern).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].bindings.get("pred"),
            Some(&space.find_by_name("helps")[0])
        );
        assert_eq!(
            matches[0].bindings.get("x"),
            Some(&space.find_by_name("AI")[0])
        );
    }

    #[test]
    fn no_candidates_is_empty_not_error() {
        let space = AtomSpace::new();
        let matcher = PatternMatcher::new(&space);
        let matches = matcher
            .matches(&Pattern::node(types::CONCEPT, "ghost"))
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn malformed_pattern_rejected_eagerly() {
        let space = AtomSpace::new();
        let matcher = PatternMatcher::new(&space);
        let err = matcher
            .matches(&Pattern::Shape {
                atom_type: None,
                name: None,
                outgoing: None,
            })
            .unwrap_err();
        assert!(matches!(err, ThothError::Pattern(_)));
    }

    #[test]
    fn match_many_joins_shared_variables() {
        let space = inheritance_space();
        let matcher = PatternMatcher::new(&space);

        let premises = [
            Pattern::link(
                types::INHERITANCE,
                vec![Pattern::var("X"), Pattern::var("Y")],
            ),
            Pattern::link(
                types::INHERITANCE,
                vec![Pattern::var("Y"), Pattern::var("Z")],
            ),
        ];
        let solutions = matcher.match_many(&premises).unwrap();
        // Only DL→ML joined with ML→AI shares its middle variable.
        assert_eq!(solutions.len(), 1);
        let bindings = &solutions[0].bindings;
        assert_eq!(bindings.get("X"), Some(&space.find_by_name("DL")[0]));
        assert_eq!(bindings.get("Y"), Some(&space.find_by_name("ML")[0]));
        assert_eq!(bindings.get("Z"), Some(&space.find_by_name("AI")[0]));
        assert_eq!(solutions[0].matched.len(), 2);
    }

    #[test]
    fn match_many_empty_input_yields_no_solutions() {
        let space = inheritance_space();
        let matcher = PatternMatcher::new(&space);
        assert!(matcher.match_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn match_many_dead_premise_short_circuits() {
        let space = inheritance_space();
        let matcher = PatternMatcher::new(&space);
        let premises = [
            Pattern::link(
                types::INHERITANCE,
                vec![Pattern::var("X"), Pattern::var("Y")],
            ),
            Pattern::node(types::CONCEPT, "ghost"),
        ];
        assert!(matcher.match_many(&premises).unwrap().is_empty());
    }
}
