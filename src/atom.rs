//! Core atom types for the thoth engine.
//!
//! Atoms are the units of the knowledge hypergraph. Every atom is identified
//! by an [`AtomId`] and is either a named node or a link holding an ordered
//! sequence of references to other atoms (links may reference links, making
//! the store a hypergraph rather than a simple graph). The type tag is an
//! open string: the well-known tags of [`types`] are conventions, not a
//! closed set.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{SpaceError, ThothResult};
use crate::truth::TruthValue;

/// Unique, niche-optimized identifier for an atom.
///
/// Uses `NonZeroU64` so that `Option<AtomId>` is the same size as `AtomId`
/// (the niche optimization lets the compiler use 0 as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AtomId(NonZeroU64);

impl AtomId {
    /// Create an `AtomId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(AtomId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atom:{}", self.0)
    }
}

/// Discriminates the two shapes an atom can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomKind {
    /// A named atom with no outgoing references.
    Node,
    /// An atom whose content is an ordered set of references to other atoms.
    Link,
}

impl std::fmt::Display for AtomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomKind::Node => write!(f, "node"),
            AtomKind::Link => write!(f, "link"),
        }
    }
}

/// The kind-specific payload of an atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomContent {
    /// A named node (e.g. a concept label).
    Node { name: String },
    /// An ordered outgoing set referencing other atoms in the same store.
    Link { outgoing: Vec<AtomId> },
}

impl AtomContent {
    /// The kind discriminator for this content.
    pub fn kind(&self) -> AtomKind {
        match self {
            AtomContent::Node { .. } => AtomKind::Node,
            AtomContent::Link { .. } => AtomKind::Link,
        }
    }
}

/// A node or link in the knowledge hypergraph.
///
/// Atoms are created only through the store's add operations, which assign
/// the id and deduplicate on (type, content). The id is unique and immutable
/// for the lifetime of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Unique identifier, assigned monotonically by the store.
    pub id: AtomId,
    /// Open string type tag (see [`types`] for the well-known tags).
    pub atom_type: String,
    /// Node name or link outgoing set.
    pub content: AtomContent,
    /// Graded belief attached to this atom.
    pub tv: TruthValue,
}

impl Atom {
    /// The kind discriminator (node or link).
    pub fn kind(&self) -> AtomKind {
        self.content.kind()
    }

    /// The node name, or `None` for links.
    pub fn name(&self) -> Option<&str> {
        match &self.content {
            AtomContent::Node { name } => Some(name),
            AtomContent::Link { .. } => None,
        }
    }

    /// The outgoing set, empty for nodes.
    pub fn outgoing(&self) -> &[AtomId] {
        match &self.content {
            AtomContent::Node { .. } => &[],
            AtomContent::Link { outgoing } => outgoing,
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.content {
            AtomContent::Node { name } => write!(f, "{}({name})", self.atom_type),
            AtomContent::Link { outgoing } => {
                write!(f, "{}(", self.atom_type)?;
                for (i, id) in outgoing.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{id}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Well-known atom type tags, following the conventions of the OpenCog
/// atom taxonomy. The store accepts any string; these are the tags the
/// convenience wrappers and default rules use.
pub mod types {
    pub const CONCEPT: &str = "ConceptNode";
    pub const PREDICATE: &str = "PredicateNode";
    pub const INHERITANCE: &str = "InheritanceLink";
    pub const EVALUATION: &str = "EvaluationLink";
    pub const LIST: &str = "ListLink";
    pub const IMPLICATION: &str = "ImplicationLink";
    pub const SIMILARITY: &str = "SimilarityLink";
}

/// Monotonic atom id allocator.
///
/// Produces increasing ids starting from 1. Atomic so the store can hand out
/// ids from behind a shared reference.
#[derive(Debug)]
pub struct AtomIdAllocator {
    next: AtomicU64,
}

impl AtomIdAllocator {
    /// Create a new allocator that starts from id 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next atom id.
    ///
    /// Returns an error if the id space is exhausted (after 2^64 - 1 allocations).
    pub fn next_id(&self) -> ThothResult<AtomId> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        AtomId::new(raw).ok_or_else(|| SpaceError::IdExhausted.into())
    }

    /// Reset the allocator to start from id 1 again.
    pub fn reset(&self) {
        self.next.store(1, Ordering::Relaxed);
    }

    /// Ensure the next allocation is strictly greater than `floor`.
    ///
    /// Used after a snapshot import so freshly allocated ids never collide
    /// with imported ones.
    pub fn advance_past(&self, floor: u64) {
        self.next.fetch_max(floor.saturating_add(1), Ordering::Relaxed);
    }

    /// Return the next id that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for AtomIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<AtomId>>(),
            std::mem::size_of::<AtomId>()
        );
    }

    #[test]
    fn atom_id_zero_is_none() {
        assert!(AtomId::new(0).is_none());
        assert_eq!(AtomId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn allocator_produces_sequential_ids() {
        let alloc = AtomIdAllocator::new();
        assert_eq!(alloc.next_id().unwrap().get(), 1);
        assert_eq!(alloc.next_id().unwrap().get(), 2);
        assert_eq!(alloc.next_id().unwrap().get(), 3);
    }

    #[test]
    fn allocator_reset_and_advance() {
        let alloc = AtomIdAllocator::new();
        alloc.next_id().unwrap();
        alloc.reset();
        assert_eq!(alloc.peek_next(), 1);
        alloc.advance_past(10);
        assert_eq!(alloc.next_id().unwrap().get(), 11);
        // advance_past never moves backwards
        alloc.advance_past(3);
        assert_eq!(alloc.next_id().unwrap().get(), 12);
    }

    #[test]
    fn atom_accessors() {
        let node = Atom {
            id: AtomId::new(1).unwrap(),
            atom_type: types::CONCEPT.into(),
            content: AtomContent::Node { name: "AI".into() },
            tv: TruthValue::CERTAIN,
        };
        assert_eq!(node.kind(), AtomKind::Node);
        assert_eq!(node.name(), Some("AI"));
        assert!(node.outgoing().is_empty());

        let link = Atom {
            id: AtomId::new(2).unwrap(),
            atom_type: types::INHERITANCE.into(),
            content: AtomContent::Link {
                outgoing: vec![AtomId::new(1).unwrap()],
            },
            tv: TruthValue::CERTAIN,
        };
        assert_eq!(link.kind(), AtomKind::Link);
        assert_eq!(link.name(), None);
        assert_eq!(link.outgoing().len(), 1);
    }

    #[test]
    fn atom_display() {
        let node = Atom {
            id: AtomId::new(1).unwrap(),
            atom_type: types::CONCEPT.into(),
            content: AtomContent::Node { name: "AI".into() },
            tv: TruthValue::CERTAIN,
        };
        assert_eq!(node.to_string(), "ConceptNode(AI)");
    }
}
