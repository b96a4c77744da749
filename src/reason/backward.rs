//! Backward chaining: goal-directed, depth-limited proof search.
//!
//! A goal pattern is satisfied directly by matching existing facts, or by
//! unifying it with a rule's conclusion and recursively proving that rule's
//! premises under the unifier. Rule variables are standardized apart per
//! application so goal and rule namespaces never collide. A set of in-flight
//! goal signatures (structural and alpha-normalized, not atom ids, since goals
//! may be partially unbound) fails circular branches instead of recursing
//! forever; depth exhaustion likewise prunes a branch silently. Neither is
//! an error: absence of proof is a valid outcome.

use std::collections::{HashMap, HashSet};

use crate::atom::{AtomContent, AtomId};
use crate::error::ThothResult;
use crate::pattern::{Bindings, Pattern, PatternMatcher, Variable, merge_bindings};
use crate::space::AtomSpace;

use super::engine::ReasoningEngine;
use super::rules::Rule;
use super::{InferenceRecord, Proof};

/// What a unification variable resolves to: a concrete atom or another
/// variable it has been aliased with.
#[derive(Debug, Clone, PartialEq)]
enum Term {
    Id(AtomId),
    Var(String),
}

type Subst = HashMap<String, Term>;

/// Internal proof with the bookkeeping the public [`Proof`] drops: the
/// directly matched atom (for premise provenance) and branch confidence.
struct ProofNode {
    bindings: Bindings,
    chain: Vec<InferenceRecord>,
    atom: Option<AtomId>,
    confidence: f32,
}

impl ReasoningEngine {
    /// Prove a goal pattern, returning every independent proof found at or
    /// below `max_depth`.
    ///
    /// Direct matches against existing facts are zero-step proofs and are
    /// found even at depth 0; each additional depth level allows one more
    /// rule application on the path from the goal to its supporting facts.
    pub fn backward_chain(&self, goal: &Pattern, max_depth: usize) -> ThothResult<Vec<Proof>> {
        goal.validate()?;
        let space = self.space_arc();
        let matcher = PatternMatcher::new(space.as_ref());

        let mut in_flight: HashSet<String> = HashSet::new();
        let mut rename_counter = 0usize;
        let nodes = self.prove(&matcher, goal, max_depth, &mut in_flight, &mut rename_counter)?;

        let mut proofs: Vec<Proof> = Vec::new();
        for node in nodes {
            let proof = Proof {
                bindings: node.bindings,
                chain: node.chain,
            };
            if !proofs.contains(&proof) {
                proofs.push(proof);
            }
        }
        tracing::debug!(proofs = proofs.len(), "backward chaining finished");
        Ok(proofs)
    }

    fn prove(
        &self,
        matcher: &PatternMatcher<'_>,
        goal: &Pattern,
        depth: usize,
        in_flight: &mut HashSet<String>,
        rename_counter: &mut usize,
    ) -> ThothResult<Vec<ProofNode>> {
        let mut nodes = Vec::new();

        // Existing facts satisfy the goal with zero rule applications.
        for m in matcher.matches(goal)? {
            let confidence = matcher.space().get(m.atom_id)?.tv.confidence;
            nodes.push(ProofNode {
                bindings: m.bindings,
                chain: Vec::new(),
                atom: Some(m.atom_id),
                confidence,
            });
        }

        if depth == 0 {
            return Ok(nodes);
        }
        let signature = goal.canonical();
        if !in_flight.insert(signature.clone()) {
            // This goal is already being proven higher up the stack: a
            // circular branch, unprovable along this path.
            return Ok(nodes);
        }

        for rule in self.rules() {
            *rename_counter += 1;
            let (premises, conclusion) = standardize_apart(rule, *rename_counter);

            let mut subst = Subst::new();
            if !unify(&conclusion, goal, &mut subst, matcher.space()) {
                continue;
            }

            // Prove the premises left to right, threading bindings through.
            let mut partials: Vec<(Bindings, Vec<InferenceRecord>, Vec<AtomId>, f32)> =
                vec![(Bindings::new(), Vec::new(), Vec::new(), f32::INFINITY)];
            for premise in &premises {
                let mut extended = Vec::new();
                for (bound, chain, sources, min_conf) in &partials {
                    let concrete = substitute(premise, &subst, bound);
                    for sub in
                        self.prove(matcher, &concrete, depth - 1, in_flight, rename_counter)?
                    {
                        let Some(merged) = merge_bindings(bound, &sub.bindings) else {
                            continue;
                        };
                        let mut chain = chain.clone();
                        chain.extend(sub.chain);
                        let mut sources = sources.clone();
                        if let Some(atom) = sub.atom {
                            sources.push(atom);
                        }
                        extended.push((merged, chain, sources, min_conf.min(sub.confidence)));
                    }
                }
                partials = extended;
                if partials.is_empty() {
                    break;
                }
            }

            for (bound, mut chain, sources, min_conf) in partials {
                let min_conf = if min_conf.is_finite() { min_conf } else { 1.0 };
                let derived_confidence = rule.confidence * min_conf;
                if derived_confidence < self.config().min_confidence {
                    continue;
                }
                let resulting = resolve_existing(matcher.space(), &conclusion, &subst, &bound);
                chain.push(InferenceRecord {
                    resulting_atom_id: resulting,
                    rule_name: rule.name.clone(),
                    source_atom_ids: sources,
                    derived_confidence,
                });
                nodes.push(ProofNode {
                    bindings: goal_bindings(goal, &subst, &bound),
                    chain,
                    atom: resulting,
                    confidence: derived_confidence,
                });
            }
        }

        in_flight.remove(&signature);
        Ok(nodes)
    }
}

// ---------------------------------------------------------------------------
// Unification
// ---------------------------------------------------------------------------

/// Follow variable aliases until a concrete id or an unbound variable.
fn walk(subst: &Subst, term: Term) -> Term {
    let mut current = term;
    loop {
        match current {
            Term::Var(name) => match subst.get(&name) {
                Some(next) => current = next.clone(),
                None => return Term::Var(name),
            },
            concrete => return concrete,
        }
    }
}

fn bind_variable(var: &Variable, term: Term, subst: &mut Subst, space: &AtomSpace) -> bool {
    // A type-constrained variable only accepts atoms of that type.
    if let (Some(constraint), Term::Id(id)) = (&var.type_constraint, &term) {
        match space.get(*id) {
            Ok(atom) if &atom.atom_type == constraint => {}
            _ => return false,
        }
    }
    match walk(subst, Term::Var(var.name.clone())) {
        Term::Id(existing) => matches!(term, Term::Id(id) if id == existing),
        Term::Var(end) => {
            if let Term::Var(other) = &term {
                if *other == end {
                    return true;
                }
            }
            subst.insert(end, term);
            true
        }
    }
}

/// Unify a rule conclusion with a goal pattern, extending `subst`.
///
/// Both sides may contain variables; variables bind to atom ids or alias
/// each other. Returns false when the structures cannot agree.
fn unify(left: &Pattern, right: &Pattern, subst: &mut Subst, space: &AtomSpace) -> bool {
    match (left, right) {
        (Pattern::Atom(a), Pattern::Atom(b)) => a == b,
        (Pattern::Variable(var), Pattern::Atom(id))
        | (Pattern::Atom(id), Pattern::Variable(var)) => {
            bind_variable(var, Term::Id(*id), subst, space)
        }
        (Pattern::Variable(a), Pattern::Variable(b)) => {
            match walk(subst, Term::Var(b.name.clone())) {
                Term::Id(id) => bind_variable(a, Term::Id(id), subst, space),
                Term::Var(end) => bind_variable(a, Term::Var(end), subst, space),
            }
        }
        (
            Pattern::Shape {
                atom_type: t1,
                name: n1,
                outgoing: o1,
            },
            Pattern::Shape {
                atom_type: t2,
                name: n2,
                outgoing: o2,
            },
        ) => {
            if let (Some(t1), Some(t2)) = (t1, t2) {
                if t1 != t2 {
                    return false;
                }
            }
            if let (Some(n1), Some(n2)) = (n1, n2) {
                if n1 != n2 {
                    return false;
                }
            }
            // A named node shape cannot be a link shape.
            if (n1.is_some() && o2.is_some()) || (o1.is_some() && n2.is_some()) {
                return false;
            }
            if let (Some(s1), Some(s2)) = (o1, o2) {
                if s1.len() != s2.len() {
                    return false;
                }
                for (a, b) in s1.iter().zip(s2) {
                    if !unify(a, b, subst, space) {
                        return false;
                    }
                }
            }
            true
        }
        (shape @ Pattern::Shape { .. }, Pattern::Atom(id))
        | (Pattern::Atom(id), shape @ Pattern::Shape { .. }) => {
            unify_shape_with_atom(shape, *id, subst, space)
        }
        // A shape against a free variable stays unconstrained: the variable
        // is left for the premises to ground.
        (Pattern::Shape { .. }, Pattern::Variable(var))
        | (Pattern::Variable(var), Pattern::Shape { .. }) => {
            match walk(subst, Term::Var(var.name.clone())) {
                Term::Id(id) => {
                    let shape = if matches!(left, Pattern::Shape { .. }) {
                        left
                    } else {
                        right
                    };
                    unify_shape_with_atom(shape, id, subst, space)
                }
                Term::Var(_) => true,
            }
        }
    }
}

fn unify_shape_with_atom(
    shape: &Pattern,
    id: AtomId,
    subst: &mut Subst,
    space: &AtomSpace,
) -> bool {
    let Pattern::Shape {
        atom_type,
        name,
        outgoing,
    } = shape
    else {
        return false;
    };
    let Ok(atom) = space.get(id) else {
        return false;
    };
    if let Some(t) = atom_type {
        if &atom.atom_type != t {
            return false;
        }
    }
    if let Some(n) = name {
        if atom.name() != Some(n.as_str()) {
            return false;
        }
    }
    if let Some(slots) = outgoing {
        let targets = atom.outgoing().to_vec();
        if targets.len() != slots.len() {
            return false;
        }
        for (slot, target) in slots.iter().zip(targets) {
            if !unify(slot, &Pattern::Atom(target), subst, space) {
                return false;
            }
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Substitution helpers
// ---------------------------------------------------------------------------

/// Rename every rule variable with a per-application suffix so rule and
/// goal variable namespaces cannot collide.
fn standardize_apart(rule: &Rule, suffix: usize) -> (Vec<Pattern>, Pattern) {
    let premises = rule
        .premises
        .iter()
        .map(|p| rename_variables(p, suffix))
        .collect();
    (premises, rename_variables(&rule.conclusion, suffix))
}

fn rename_variables(pattern: &Pattern, suffix: usize) -> Pattern {
    match pattern {
        Pattern::Atom(id) => Pattern::Atom(*id),
        Pattern::Variable(var) => Pattern::Variable(Variable {
            name: format!("{}__{suffix}", var.name),
            type_constraint: var.type_constraint.clone(),
        }),
        Pattern::Shape {
            atom_type,
            name,
            outgoing,
        } => Pattern::Shape {
            atom_type: atom_type.clone(),
            name: name.clone(),
            outgoing: outgoing
                .as_ref()
                .map(|slots| slots.iter().map(|s| rename_variables(s, suffix)).collect()),
        },
    }
}

/// Apply the unifier and the accumulated premise bindings to a pattern.
fn substitute(pattern: &Pattern, subst: &Subst, bound: &Bindings) -> Pattern {
    match pattern {
        Pattern::Atom(id) => Pattern::Atom(*id),
        Pattern::Variable(var) => match walk(subst, Term::Var(var.name.clone())) {
            Term::Id(id) => Pattern::Atom(id),
            Term::Var(name) => match bound.get(&name) {
                Some(&id) => Pattern::Atom(id),
                None => Pattern::Variable(Variable {
                    name,
                    type_constraint: var.type_constraint.clone(),
                }),
            },
        },
        Pattern::Shape {
            atom_type,
            name,
            outgoing,
        } => Pattern::Shape {
            atom_type: atom_type.clone(),
            name: name.clone(),
            outgoing: outgoing
                .as_ref()
                .map(|slots| slots.iter().map(|s| substitute(s, subst, bound)).collect()),
        },
    }
}

/// Resolve the goal's own variables out of the unifier and premise bindings.
fn goal_bindings(goal: &Pattern, subst: &Subst, bound: &Bindings) -> Bindings {
    let mut bindings = Bindings::new();
    for name in goal.variables() {
        match walk(subst, Term::Var(name.clone())) {
            Term::Id(id) => {
                bindings.insert(name, id);
            }
            Term::Var(end) => {
                if let Some(&id) = bound.get(&end) {
                    bindings.insert(name, id);
                }
            }
        }
    }
    bindings
}

/// If the concluded atom is fully ground and already present, name it.
fn resolve_existing(
    space: &AtomSpace,
    conclusion: &Pattern,
    subst: &Subst,
    bound: &Bindings,
) -> Option<AtomId> {
    match substitute(conclusion, subst, bound) {
        Pattern::Atom(id) => Some(id),
        Pattern::Variable(_) => None,
        Pattern::Shape {
            atom_type,
            name,
            outgoing,
        } => {
            let atom_type = atom_type?;
            match (name, outgoing) {
                (Some(n), None) => space.find_exact(&atom_type, &AtomContent::Node { name: n }),
                (None, Some(slots)) => {
                    let ids: Option<Vec<AtomId>> = slots
                        .iter()
                        .map(|slot| match slot {
                            Pattern::Atom(id) => Some(*id),
                            _ => None,
                        })
                        .collect();
                    space.find_exact(&atom_type, &AtomContent::Link { outgoing: ids? })
                }
                _ => None,
            }
        }
    }
}
