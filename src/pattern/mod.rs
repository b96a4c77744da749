//! Pattern templates for structural search over the atom store.
//!
//! A [`Pattern`] is a recursive template: a literal atom id, a variable
//! (optionally type-constrained), or a shape constraining type, name, and
//! outgoing slots, where each slot is itself a pattern. Distinct occurrences
//! of one variable name must bind to the same atom, within a pattern and
//! across the premises of a rule.
//!
//! Patterns are validated eagerly: a structurally unresolvable template is
//! rejected with `InvalidPattern` before any traversal is attempted.

mod matcher;
mod similarity;
mod traverse;

pub use matcher::{ConjunctiveMatch, Match, PatternMatcher};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::atom::AtomId;
use crate::error::{PatternError, ThothResult};

/// Nesting guard: patterns deeper than this are rejected as malformed.
/// Real knowledge shapes are shallow; anything past this bound is a
/// programmatically constructed cycle or runaway builder.
const MAX_PATTERN_DEPTH: usize = 32;

/// A placeholder in a pattern, optionally constrained to one atom type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub type_constraint: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_constraint: None,
        }
    }

    pub fn typed(name: impl Into<String>, atom_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_constraint: Some(atom_type.into()),
        }
    }
}

/// A template atom shape: literal, variable, or constrained sub-shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Matches exactly one atom by id.
    Atom(AtomId),
    /// Matches any atom satisfying the variable's type constraint, binding
    /// the variable to the matched atom's id.
    Variable(Variable),
    /// Matches atoms structurally. `None` fields are unconstrained; an
    /// `outgoing` list must match the candidate's outgoing set positionally
    /// and in full.
    Shape {
        atom_type: Option<String>,
        name: Option<String>,
        outgoing: Option<Vec<Pattern>>,
    },
}

impl Pattern {
    /// A literal atom pattern.
    pub fn atom(id: AtomId) -> Self {
        Pattern::Atom(id)
    }

    /// An unconstrained variable.
    pub fn var(name: impl Into<String>) -> Self {
        Pattern::Variable(Variable::new(name))
    }

    /// A type-constrained variable.
    pub fn var_typed(name: impl Into<String>, atom_type: impl Into<String>) -> Self {
        Pattern::Variable(Variable::typed(name, atom_type))
    }

    /// A node shape: type and exact name.
    pub fn node(atom_type: impl Into<String>, name: impl Into<String>) -> Self {
        Pattern::Shape {
            atom_type: Some(atom_type.into()),
            name: Some(name.into()),
            outgoing: None,
        }
    }

    /// A link shape: type and positional outgoing slots.
    pub fn link(atom_type: impl Into<String>, outgoing: Vec<Pattern>) -> Self {
        Pattern::Shape {
            atom_type: Some(atom_type.into()),
            name: None,
            outgoing: Some(outgoing),
        }
    }

    /// Any atom of the given type.
    pub fn of_type(atom_type: impl Into<String>) -> Self {
        Pattern::Shape {
            atom_type: Some(atom_type.into()),
            name: None,
            outgoing: None,
        }
    }

    /// Validate the pattern eagerly, before any store traversal.
    ///
    /// Rejects empty variable names, one variable name carrying two
    /// different type constraints, shapes with no constraints at all, and
    /// nesting beyond [`MAX_PATTERN_DEPTH`].
    pub fn validate(&self) -> ThothResult<()> {
        let mut constraints: BTreeMap<&str, &Option<String>> = BTreeMap::new();
        self.validate_walk(0, &mut constraints)?;
        Ok(())
    }

    fn validate_walk<'a>(
        &'a self,
        depth: usize,
        constraints: &mut BTreeMap<&'a str, &'a Option<String>>,
    ) -> Result<(), PatternError> {
        if depth > MAX_PATTERN_DEPTH {
            return Err(PatternError::InvalidPattern {
                message: format!("nesting exceeds {MAX_PATTERN_DEPTH} levels"),
            });
        }
        match self {
            Pattern::Atom(_) => Ok(()),
            Pattern::Variable(var) => {
                if var.name.is_empty() {
                    return Err(PatternError::InvalidPattern {
                        message: "variable with empty name".into(),
                    });
                }
                if let Some(previous) = constraints.insert(var.name.as_str(), &var.type_constraint) {
                    if previous != &var.type_constraint {
                        return Err(PatternError::InvalidPattern {
                            message: format!(
                                "variable ${} carries conflicting type constraints",
                                var.name
                            ),
                        });
                    }
                }
                Ok(())
            }
            Pattern::Shape {
                atom_type,
                name,
                outgoing,
            } => {
                if atom_type.is_none() && name.is_none() && outgoing.is_none() {
                    return Err(PatternError::InvalidPattern {
                        message: "shape with no constraints".into(),
                    });
                }
                if let Some(slots) = outgoing {
                    for slot in slots {
                        slot.validate_walk(depth + 1, constraints)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// All variable names appearing in the pattern, in first-appearance order.
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Atom(_) => {}
            Pattern::Variable(var) => {
                if !out.contains(&var.name) {
                    out.push(var.name.clone());
                }
            }
            Pattern::Shape { outgoing, .. } => {
                if let Some(slots) = outgoing {
                    for slot in slots {
                        slot.collect_variables(out);
                    }
                }
            }
        }
    }

    /// Deterministic structural signature, alpha-normalized.
    ///
    /// Variable names are replaced by their first-appearance index, so two
    /// patterns that differ only in variable naming share a signature. Used
    /// by backward chaining to detect a goal already on the recursion stack.
    pub fn canonical(&self) -> String {
        let mut names: Vec<String> = Vec::new();
        let mut out = String::new();
        self.canonical_walk(&mut names, &mut out);
        out
    }

    fn canonical_walk(&self, names: &mut Vec<String>, out: &mut String) {
        match self {
            Pattern::Atom(id) => {
                out.push('#');
                out.push_str(&id.get().to_string());
            }
            Pattern::Variable(var) => {
                let index = match names.iter().position(|n| n == &var.name) {
                    Some(i) => i,
                    None => {
                        names.push(var.name.clone());
                        names.len() - 1
                    }
                };
                out.push('$');
                out.push_str(&index.to_string());
                if let Some(t) = &var.type_constraint {
                    out.push(':');
                    out.push_str(t);
                }
            }
            Pattern::Shape {
                atom_type,
                name,
                outgoing,
            } => {
                out.push('(');
                out.push_str(atom_type.as_deref().unwrap_or("*"));
                out.push('|');
                out.push_str(name.as_deref().unwrap_or("*"));
                if let Some(slots) = outgoing {
                    out.push('[');
                    for (i, slot) in slots.iter().enumerate() {
                        if i > 0 {
                            out.push(' ');
                        }
                        slot.canonical_walk(names, out);
                    }
                    out.push(']');
                }
                out.push(')');
            }
        }
    }
}

/// Variable name → atom id assignments produced by a successful match.
///
/// Within one binding set, a name maps to exactly one atom id; merges that
/// would contradict an existing assignment fail the candidate.
pub type Bindings = BTreeMap<String, AtomId>;

/// Merge two binding sets, failing on any contradictory assignment.
pub fn merge_bindings(a: &Bindings, b: &Bindings) -> Option<Bindings> {
    let mut merged = a.clone();
    for (name, &id) in b {
        match merged.get(name) {
            Some(&existing) if existing != id => return None,
            _ => {
                merged.insert(name.clone(), id);
            }
        }
    }
    Some(merged)
}
