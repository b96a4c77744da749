//! # thoth
//!
//! A symbolic knowledge engine: a typed hypergraph store holding nodes and
//! links annotated with (strength, confidence) truth values, a unification
//! pattern matcher, and a rule-based reasoning engine with forward and
//! backward chaining.
//!
//! ## Architecture
//!
//! - **Atom store** (`space`): owns all atoms, assigns identity, dedups on
//!   structure, and keeps name/type/incoming indices synchronously consistent
//! - **Pattern matcher** (`pattern`): read-only structural unification,
//!   similarity scoring, and bounded traversal over one store
//! - **Reasoning engine** (`reason`): forward-chaining fixpoint iteration and
//!   cycle-safe backward proof search over declarative rules
//!
//! The store is the sole owner of atom lifetime; matcher and reasoner are
//! constructed with explicit store references and hold no snapshot; every
//! mutation is visible to them immediately. The core is synchronous and
//! single-writer: hosts embedding it concurrently serialize writes
//! externally.
//!
//! ## Library usage
//!
//! ```
//! use std::sync::Arc;
//! use thoth::reason::ReasoningEngine;
//! use thoth::space::AtomSpace;
//!
//! let space = Arc::new(AtomSpace::new());
//! space.add_inheritance("ML", "AI", None).unwrap();
//! space.add_inheritance("DL", "ML", None).unwrap();
//!
//! let mut engine = ReasoningEngine::new(Arc::clone(&space));
//! engine.add_default_rules().unwrap();
//! let derived = engine.forward_chain(100).unwrap();
//! assert_eq!(derived.len(), 1); // Inheritance(DL, AI)
//! ```

pub mod atom;
pub mod error;
pub mod pattern;
pub mod reason;
pub mod space;
pub mod truth;

pub use atom::{Atom, AtomContent, AtomId, AtomKind};
pub use error::{ThothError, ThothResult};
pub use pattern::{Bindings, Match, Pattern, PatternMatcher, Variable};
pub use reason::{InferenceRecord, Proof, ReasonerConfig, ReasoningEngine, Rule};
pub use space::{AtomRecord, AtomSpace, RemovePolicy, Snapshot};
pub use truth::TruthValue;
