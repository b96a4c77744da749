//! Structural similarity between atoms.
//!
//! Two atoms are compared by the Jaccard overlap of their depth-1
//! neighborhoods (every atom reachable through one link, in either
//! direction), blended with a bonus when the type tags agree. Purely
//! structural: no name-distance heuristics.

use crate::atom::AtomId;
use crate::error::ThothResult;

use super::PatternMatcher;

/// Weight of the same-type bonus; the rest of the score is neighborhood
/// overlap. `score = 0.8·jaccard + 0.2·[types equal]`.
const TYPE_BONUS_WEIGHT: f32 = 0.2;

impl PatternMatcher<'_> {
    /// Find atoms structurally similar to `atom_id`.
    ///
    /// Returns `(id, score)` pairs with score ≥ `threshold`, excluding the
    /// atom itself, sorted descending by score with ascending id as the tie
    /// break. Fails with `NotFound` if the target atom is absent.
    pub fn find_similar(
        &self,
        atom_id: AtomId,
        threshold: f32,
    ) -> ThothResult<Vec<(AtomId, f32)>> {
        let target = self.space().get(atom_id)?;
        let target_neighborhood = self.neighborhood(atom_id)?;

        let mut scored = Vec::new();
        for candidate_id in self.space().all_ids() {
            if candidate_id == atom_id {
                continue;
            }
            let candidate = self.space().get(candidate_id)?;
            let overlap = jaccard(&target_neighborhood, &self.neighborhood(candidate_id)?);
            let type_bonus = if candidate.atom_type == target.atom_type {
                1.0
            } else {
                0.0
            };
            let score = (1.0 - TYPE_BONUS_WEIGHT) * overlap + TYPE_BONUS_WEIGHT * type_bonus;
            if score >= threshold {
                scored.push((candidate_id, score));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        Ok(scored)
    }

    /// The depth-1 neighborhood: outgoing targets plus referencing links.
    fn neighborhood(&self, id: AtomId) -> ThothResult<Vec<AtomId>> {
        let mut ids = self.space().outgoing_of(id)?;
        ids.extend(self.space().incoming_of(id)?);
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

fn jaccard(a: &[AtomId], b: &[AtomId]) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.iter().filter(|&id| b.contains(id)).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}
