//! Bounded connectivity traversal over the hypergraph.
//!
//! BFS from a start atom following both directions: outgoing references
//! (from a link to its components) and incoming references (links whose
//! outgoing set names the current atom). A visited set guarantees
//! termination on cyclic hypergraphs.

use std::collections::{HashSet, VecDeque};

use crate::atom::AtomId;
use crate::error::ThothResult;

use super::PatternMatcher;

impl PatternMatcher<'_> {
    /// All atoms reachable from `start` within `max_depth` hops, in
    /// discovery order, excluding the start atom.
    ///
    /// `max_depth = 0` reaches nothing; an unknown start atom likewise
    /// yields an empty list (connectivity of an absent atom is empty, not a
    /// fault).
    pub fn find_connected(&self, start: AtomId, max_depth: usize) -> ThothResult<Vec<AtomId>> {
        self.find_connected_filtered(start, max_depth, None)
    }

    /// Like [`find_connected`](Self::find_connected), but only visiting
    /// neighbors whose type tag is in `type_filter` (when given).
    pub fn find_connected_filtered(
        &self,
        start: AtomId,
        max_depth: usize,
        type_filter: Option<&[&str]>,
    ) -> ThothResult<Vec<AtomId>> {
        if !self.space().contains(start) {
            return Ok(Vec::new());
        }

        let mut visited: HashSet<AtomId> = HashSet::from([start]);
        let mut discovered = Vec::new();
        let mut queue: VecDeque<(AtomId, usize)> = VecDeque::from([(start, 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let mut neighbors = self.space().outgoing_of(current)?;
            neighbors.extend(self.space().incoming_of(current)?);

            for neighbor in neighbors {
                if visited.contains(&neighbor) {
                    continue;
                }
                if let Some(filter) = type_filter {
                    let atom = self.space().get(neighbor)?;
                    if !filter.contains(&atom.atom_type.as_str()) {
                        continue;
                    }
                }
                visited.insert(neighbor);
                discovered.push(neighbor);
                queue.push_back((neighbor, depth + 1));
            }
        }
        Ok(discovered)
    }
}
