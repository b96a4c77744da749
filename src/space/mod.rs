//! The atom store: an in-memory typed hypergraph with structural dedup.
//!
//! [`AtomSpace`] owns every atom, assigns identity, and keeps four secondary
//! indices consistent with each mutation: name → node ids, type → ids,
//! incoming (id → links whose outgoing set references it), and a content
//! index keyed on (type, name) for nodes and (type, outgoing) for links.
//! Re-adding an atom with identical type and content returns the existing id
//! and merges the submitted truth value into the stored one.
//!
//! Mutation goes through `&self` behind internal locks, but the store is
//! single-writer by contract: callers embedding it in a concurrent host are
//! responsible for external mutual exclusion around write sequences, and for
//! keeping readers out while a writer runs; index updates are synchronous
//! per operation but not atomic across operations.

mod snapshot;

pub use snapshot::{AtomRecord, Snapshot};

use std::collections::BTreeMap;
use std::sync::RwLock;

use dashmap::DashMap;

use crate::atom::{Atom, AtomContent, AtomId, AtomIdAllocator, types};
use crate::error::{SpaceError, ThothResult};
use crate::truth::TruthValue;

/// Structural identity of an atom, used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ContentKey {
    Node { atom_type: String, name: String },
    Link { atom_type: String, outgoing: Vec<AtomId> },
}

impl ContentKey {
    fn of(atom_type: &str, content: &AtomContent) -> Self {
        match content {
            AtomContent::Node { name } => ContentKey::Node {
                atom_type: atom_type.to_string(),
                name: name.clone(),
            },
            AtomContent::Link { outgoing } => ContentKey::Link {
                atom_type: atom_type.to_string(),
                outgoing: outgoing.clone(),
            },
        }
    }
}

/// What to do when removing an atom that other links still reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovePolicy {
    /// Fail with `ReferencedByOthers` if any live link references the atom.
    Restrict,
    /// Remove dependent links first, depth-first, then the atom itself.
    Cascade,
}

/// In-memory typed hypergraph store.
pub struct AtomSpace {
    /// Primary map, ordered by id (source of truth).
    atoms: RwLock<BTreeMap<AtomId, Atom>>,
    /// Node name → atom ids.
    name_index: DashMap<String, Vec<AtomId>>,
    /// Type tag → atom ids.
    type_index: DashMap<String, Vec<AtomId>>,
    /// Atom id → ids of links referencing it in their outgoing set.
    incoming: DashMap<AtomId, Vec<AtomId>>,
    /// Structural dedup index.
    content_index: DashMap<ContentKey, AtomId>,
    allocator: AtomIdAllocator,
}

impl AtomSpace {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            atoms: RwLock::new(BTreeMap::new()),
            name_index: DashMap::new(),
            type_index: DashMap::new(),
            incoming: DashMap::new(),
            content_index: DashMap::new(),
            allocator: AtomIdAllocator::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Add operations
    // -----------------------------------------------------------------------

    /// Add a node with the given type tag and name.
    ///
    /// Returns the existing id if a node with the same (type, name) is
    /// already present, merging `tv` into the stored truth value.
    pub fn add_node(
        &self,
        atom_type: impl Into<String>,
        name: impl Into<String>,
        tv: Option<TruthValue>,
    ) -> ThothResult<AtomId> {
        self.add_atom(
            atom_type.into(),
            AtomContent::Node { name: name.into() },
            tv,
        )
    }

    /// Add a link with the given type tag and outgoing set.
    ///
    /// Fails with `InvalidReference` if any outgoing id is unknown. Returns
    /// the existing id if a link with the same (type, outgoing) is already
    /// present, merging `tv` into the stored truth value.
    pub fn add_link(
        &self,
        atom_type: impl Into<String>,
        outgoing: &[AtomId],
        tv: Option<TruthValue>,
    ) -> ThothResult<AtomId> {
        self.add_atom(
            atom_type.into(),
            AtomContent::Link {
                outgoing: outgoing.to_vec(),
            },
            tv,
        )
    }

    fn add_atom(
        &self,
        atom_type: String,
        content: AtomContent,
        tv: Option<TruthValue>,
    ) -> ThothResult<AtomId> {
        // Validate references up front so a failing add leaves no trace.
        if let AtomContent::Link { outgoing } = &content {
            for &target in outgoing {
                if !self.contains(target) {
                    return Err(SpaceError::InvalidReference {
                        missing: target.get(),
                    }
                    .into());
                }
            }
        }

        let key = ContentKey::of(&atom_type, &content);
        if let Some(existing) = self.content_index.get(&key) {
            let id = *existing.value();
            drop(existing);
            if let Some(submitted) = tv {
                let mut atoms = self.atoms.write().expect("atom map lock poisoned");
                if let Some(atom) = atoms.get_mut(&id) {
                    atom.tv = atom.tv.merge(submitted);
                }
            }
            return Ok(id);
        }

        let id = self.allocator.next_id()?;
        let atom = Atom {
            id,
            atom_type: atom_type.clone(),
            content: content.clone(),
            tv: tv.unwrap_or_default(),
        };

        match &content {
            AtomContent::Node { name } => {
                self.name_index.entry(name.clone()).or_default().push(id);
            }
            AtomContent::Link { outgoing } => {
                for &target in outgoing {
                    self.incoming.entry(target).or_default().push(id);
                }
            }
        }
        self.type_index.entry(atom_type).or_default().push(id);
        self.content_index.insert(key, id);
        self.atoms
            .write()
            .expect("atom map lock poisoned")
            .insert(id, atom);

        tracing::debug!(%id, "added atom");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Convenience wrappers
    // -----------------------------------------------------------------------

    /// Add a `ConceptNode`.
    pub fn add_concept(&self, name: &str, tv: Option<TruthValue>) -> ThothResult<AtomId> {
        self.add_node(types::CONCEPT, name, tv)
    }

    /// Add a `PredicateNode`.
    pub fn add_predicate(&self, name: &str, tv: Option<TruthValue>) -> ThothResult<AtomId> {
        self.add_node(types::PREDICATE, name, tv)
    }

    /// Add an `InheritanceLink` between two concepts, creating the concept
    /// nodes as needed.
    pub fn add_inheritance(
        &self,
        child: &str,
        parent: &str,
        tv: Option<TruthValue>,
    ) -> ThothResult<AtomId> {
        let child_id = self.add_concept(child, None)?;
        let parent_id = self.add_concept(parent, None)?;
        self.add_link(types::INHERITANCE, &[child_id, parent_id], tv)
    }

    /// Add an `EvaluationLink` applying a predicate to concept arguments.
    ///
    /// A single argument is referenced directly; two or more go through a
    /// `ListLink`, following the OpenCog evaluation shape.
    pub fn add_evaluation(
        &self,
        predicate: &str,
        args: &[&str],
        tv: Option<TruthValue>,
    ) -> ThothResult<AtomId> {
        let pred_id = self.add_predicate(predicate, None)?;
        let arg_ids: Vec<AtomId> = args
            .iter()
            .map(|a| self.add_concept(a, None))
            .collect::<ThothResult<_>>()?;

        if arg_ids.len() == 1 {
            self.add_link(types::EVALUATION, &[pred_id, arg_ids[0]], tv)
        } else {
            let list_id = self.add_link(types::LIST, &arg_ids, None)?;
            self.add_link(types::EVALUATION, &[pred_id, list_id], tv)
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Get an atom by id. Fails with `NotFound` if absent.
    pub fn get(&self, id: AtomId) -> ThothResult<Atom> {
        self.atoms
            .read()
            .expect("atom map lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| SpaceError::NotFound { id: id.get() }.into())
    }

    /// Whether an atom with this id exists.
    pub fn contains(&self, id: AtomId) -> bool {
        self.atoms
            .read()
            .expect("atom map lock poisoned")
            .contains_key(&id)
    }

    /// All node ids carrying this exact name, ascending.
    pub fn find_by_name(&self, name: &str) -> Vec<AtomId> {
        let mut ids = self
            .name_index
            .get(name)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// All atom ids carrying this type tag, ascending.
    pub fn find_by_type(&self, atom_type: &str) -> Vec<AtomId> {
        let mut ids = self
            .type_index
            .get(atom_type)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Node ids whose name contains `needle`, case-insensitively, ascending.
    pub fn find_name_contains(&self, needle: &str) -> Vec<AtomId> {
        let needle = needle.to_lowercase();
        let mut ids: Vec<AtomId> = self
            .name_index
            .iter()
            .filter(|e| e.key().to_lowercase().contains(&needle))
            .flat_map(|e| e.value().clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Probe the dedup index for an atom with this exact type and content.
    pub fn find_exact(&self, atom_type: &str, content: &AtomContent) -> Option<AtomId> {
        self.content_index
            .get(&ContentKey::of(atom_type, content))
            .map(|e| *e.value())
    }

    /// The outgoing set of an atom (empty for nodes).
    pub fn outgoing_of(&self, id: AtomId) -> ThothResult<Vec<AtomId>> {
        Ok(self.get(id)?.outgoing().to_vec())
    }

    /// Ids of links referencing this atom in their outgoing set, ascending.
    pub fn incoming_of(&self, id: AtomId) -> ThothResult<Vec<AtomId>> {
        if !self.contains(id) {
            return Err(SpaceError::NotFound { id: id.get() }.into());
        }
        let mut ids = self
            .incoming
            .get(&id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    /// All atom ids in the store, ascending.
    pub fn all_ids(&self) -> Vec<AtomId> {
        self.atoms
            .read()
            .expect("atom map lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Number of atoms in the store.
    pub fn len(&self) -> usize {
        self.atoms.read().expect("atom map lock poisoned").len()
    }

    /// Whether the store holds no atoms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Replace the truth value of an atom.
    pub fn set_truth(&self, id: AtomId, tv: TruthValue) -> ThothResult<()> {
        let mut atoms = self.atoms.write().expect("atom map lock poisoned");
        match atoms.get_mut(&id) {
            Some(atom) => {
                atom.tv = tv;
                Ok(())
            }
            None => Err(SpaceError::NotFound { id: id.get() }.into()),
        }
    }

    /// Remove an atom.
    ///
    /// With [`RemovePolicy::Restrict`], fails with `ReferencedByOthers` if any
    /// live link still references the atom. With [`RemovePolicy::Cascade`],
    /// dependent links are removed first, depth-first.
    pub fn remove(&self, id: AtomId, policy: RemovePolicy) -> ThothResult<()> {
        if !self.contains(id) {
            return Err(SpaceError::NotFound { id: id.get() }.into());
        }
        let referrers = self.incoming_of(id)?;
        match policy {
            RemovePolicy::Restrict => {
                if !referrers.is_empty() {
                    return Err(SpaceError::ReferencedByOthers {
                        id: id.get(),
                        referrers: referrers.len(),
                    }
                    .into());
                }
                self.remove_single(id);
            }
            RemovePolicy::Cascade => {
                // Outgoing references always point at older atoms, so the
                // incoming closure is acyclic; the visited set guards against
                // diamonds (two removed links sharing a target).
                let mut visited = std::collections::HashSet::new();
                self.remove_depth_first(id, &mut visited);
            }
        }
        Ok(())
    }

    fn remove_depth_first(&self, id: AtomId, visited: &mut std::collections::HashSet<AtomId>) {
        if !visited.insert(id) || !self.contains(id) {
            return;
        }
        let referrers = self
            .incoming
            .get(&id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        for referrer in referrers {
            self.remove_depth_first(referrer, visited);
        }
        self.remove_single(id);
    }

    fn remove_single(&self, id: AtomId) {
        let atom = {
            let mut atoms = self.atoms.write().expect("atom map lock poisoned");
            atoms.remove(&id)
        };
        let Some(atom) = atom else { return };

        self.content_index
            .remove(&ContentKey::of(&atom.atom_type, &atom.content));
        if let Some(mut entry) = self.type_index.get_mut(&atom.atom_type) {
            entry.value_mut().retain(|&x| x != id);
        }
        match &atom.content {
            AtomContent::Node { name } => {
                if let Some(mut entry) = self.name_index.get_mut(name) {
                    entry.value_mut().retain(|&x| x != id);
                }
            }
            AtomContent::Link { outgoing } => {
                for target in outgoing {
                    if let Some(mut entry) = self.incoming.get_mut(target) {
                        entry.value_mut().retain(|&x| x != id);
                    }
                }
            }
        }
        self.incoming.remove(&id);
        tracing::debug!(%id, "removed atom");
    }

    /// Drop all atoms and reset id allocation.
    pub fn clear(&self) {
        self.atoms.write().expect("atom map lock poisoned").clear();
        self.name_index.clear();
        self.type_index.clear();
        self.incoming.clear();
        self.content_index.clear();
        self.allocator.reset();
        tracing::info!("atom store cleared");
    }

    pub(crate) fn allocator(&self) -> &AtomIdAllocator {
        &self.allocator
    }

    pub(crate) fn atoms(&self) -> &RwLock<BTreeMap<AtomId, Atom>> {
        &self.atoms
    }

    pub(crate) fn insert_raw(&self, atom: Atom) {
        let id = atom.id;
        match &atom.content {
            AtomContent::Node { name } => {
                self.name_index.entry(name.clone()).or_default().push(id);
            }
            AtomContent::Link { outgoing } => {
                for &target in outgoing {
                    self.incoming.entry(target).or_default().push(id);
                }
            }
        }
        self.type_index
            .entry(atom.atom_type.clone())
            .or_default()
            .push(id);
        self.content_index
            .insert(ContentKey::of(&atom.atom_type, &atom.content), id);
        self.atoms
            .write()
            .expect("atom map lock poisoned")
            .insert(id, atom);
    }

    pub(crate) fn has_content(&self, key_type: &str, content: &AtomContent) -> bool {
        self.content_index
            .contains_key(&ContentKey::of(key_type, content))
    }
}

impl Default for AtomSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomSpace")
            .field("atoms", &self.len())
            .field("next_id", &self.allocator.peek_next())
            .finish()
    }
}
