//! Forward and backward chaining over declarative rules.
//!
//! The [`ReasoningEngine`] consumes an atom store (read/write) and uses the
//! pattern matcher as its premise-matching primitive. Forward chaining runs
//! rules to a fixpoint, writing derived atoms back into the store with an
//! audit trail; backward chaining proves goal patterns by reducing them to
//! provable premises, depth-limited and cycle-safe.

mod backward;
mod engine;
mod forward;
mod rules;

pub use engine::{ReasonerConfig, ReasoningEngine};
pub use rules::{Rule, default_rules};

use serde::{Deserialize, Serialize};

use crate::atom::AtomId;
use crate::pattern::Bindings;

/// Audit-trail entry for one rule application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    /// The derived atom. Always `Some` for forward chaining, which
    /// materializes its conclusions; `None` for backward-chaining steps
    /// whose conclusion is hypothetical and not present in the store.
    pub resulting_atom_id: Option<AtomId>,
    /// Name of the rule applied.
    pub rule_name: String,
    /// The atoms that satisfied the rule's premises.
    pub source_atom_ids: Vec<AtomId>,
    /// Confidence of the derivation: rule confidence times the weakest
    /// premise confidence.
    pub derived_confidence: f32,
}

/// One successful backward-chaining proof of a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct Proof {
    /// Assignments for the goal's variables.
    pub bindings: Bindings,
    /// Rule applications supporting the goal, leaf steps first. Empty for a
    /// goal satisfied directly by an existing atom.
    pub chain: Vec<InferenceRecord>,
}
