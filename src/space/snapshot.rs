//! Snapshot export and import for the atom store.
//!
//! A snapshot is a flat, topologically ordered list of atom records: every
//! link's outgoing ids refer only to records listed earlier (or atoms already
//! present in the importing store). Import validates the whole snapshot
//! before touching the store, so a failed import leaves it unchanged.
//! Persistence is delegated to the host: the records serialize with serde
//! and round-trip through `serde_json` or any other format the host applies.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::atom::{Atom, AtomContent, AtomId};
use crate::error::{SpaceError, ThothResult};
use crate::truth::TruthValue;

use super::{AtomSpace, ContentKey};

/// One atom in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AtomRecord {
    Node {
        id: u64,
        #[serde(rename = "type")]
        atom_type: String,
        name: String,
        truth_value: TruthValue,
    },
    Link {
        id: u64,
        #[serde(rename = "type")]
        atom_type: String,
        outgoing: Vec<u64>,
        truth_value: TruthValue,
    },
}

impl AtomRecord {
    fn id(&self) -> u64 {
        match self {
            AtomRecord::Node { id, .. } | AtomRecord::Link { id, .. } => *id,
        }
    }

    fn from_atom(atom: &Atom) -> Self {
        match &atom.content {
            AtomContent::Node { name } => AtomRecord::Node {
                id: atom.id.get(),
                atom_type: atom.atom_type.clone(),
                name: name.clone(),
                truth_value: atom.tv,
            },
            AtomContent::Link { outgoing } => AtomRecord::Link {
                id: atom.id.get(),
                atom_type: atom.atom_type.clone(),
                outgoing: outgoing.iter().map(|o| o.get()).collect(),
                truth_value: atom.tv,
            },
        }
    }
}

/// A serializable image of an entire atom store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub atoms: Vec<AtomRecord>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl AtomSpace {
    /// Export the store as a topologically ordered snapshot.
    ///
    /// Records are emitted dependency-first: each link appears after every
    /// atom its outgoing set references. Ties resolve in ascending id order,
    /// so exporting the same store twice yields identical snapshots.
    pub fn export(&self) -> Snapshot {
        let atoms = self.atoms().read().expect("atom map lock poisoned");
        let mut emitted: HashSet<AtomId> = HashSet::new();
        let mut records = Vec::with_capacity(atoms.len());

        fn emit(
            id: AtomId,
            atoms: &std::collections::BTreeMap<AtomId, Atom>,
            emitted: &mut HashSet<AtomId>,
            records: &mut Vec<AtomRecord>,
        ) {
            if !emitted.insert(id) {
                return;
            }
            let Some(atom) = atoms.get(&id) else { return };
            for &target in atom.outgoing() {
                emit(target, atoms, emitted, records);
            }
            records.push(AtomRecord::from_atom(atom));
        }

        for &id in atoms.keys() {
            emit(id, &atoms, &mut emitted, &mut records);
        }
        Snapshot { atoms: records }
    }

    /// Import a snapshot into the store, preserving record ids.
    ///
    /// The whole snapshot is validated in one pass before any atom lands:
    /// ids must be nonzero and collide with nothing (neither the store nor
    /// earlier records), link outgoing sets may only reference earlier
    /// records or atoms already present, and record content must not
    /// duplicate existing content. On any violation the import fails with
    /// `InvalidSnapshot` and the store is untouched. Afterwards the id
    /// allocator resumes past the highest imported id.
    pub fn import(&self, snapshot: &Snapshot) -> ThothResult<()> {
        // Validation pass.
        let mut seen_ids: HashSet<u64> = HashSet::new();
        let mut seen_content: HashSet<ContentKey> = HashSet::new();
        for (index, record) in snapshot.atoms.iter().enumerate() {
            let raw = record.id();
            if raw == 0 {
                return Err(SpaceError::InvalidSnapshot {
                    index,
                    message: "atom id 0 is not allowed".into(),
                }
                .into());
            }
            let id = AtomId::new(raw).expect("nonzero checked above");
            if self.contains(id) || !seen_ids.insert(raw) {
                return Err(SpaceError::InvalidSnapshot {
                    index,
                    message: format!("duplicate atom id {raw}"),
                }
                .into());
            }

            if let AtomRecord::Link { outgoing, .. } = record {
                for &target in outgoing {
                    let known = target != 0
                        && (seen_ids.contains(&target)
                            || AtomId::new(target).is_some_and(|t| self.contains(t)));
                    if !known {
                        return Err(SpaceError::InvalidSnapshot {
                            index,
                            message: format!(
                                "link {raw} references id {target} before it is defined"
                            ),
                        }
                        .into());
                    }
                }
            }

            let (atom_type, content) = record_parts(record);

            let key = ContentKey::of(&atom_type, &content);
            if self.has_content(&atom_type, &content) || !seen_content.insert(key) {
                return Err(SpaceError::InvalidSnapshot {
                    index,
                    message: format!("record {raw} duplicates the content of another atom"),
                }
                .into());
            }
        }

        // Apply pass. Cannot fail after validation.
        let mut max_id = 0;
        for record in &snapshot.atoms {
            let (atom_type, content) = record_parts(record);
            let tv = match record {
                AtomRecord::Node { truth_value, .. } | AtomRecord::Link { truth_value, .. } => {
                    TruthValue::new(truth_value.strength, truth_value.confidence)
                }
            };
            let id = AtomId::new(record.id()).expect("validated nonzero");
            max_id = max_id.max(id.get());
            self.insert_raw(Atom {
                id,
                atom_type,
                content,
                tv,
            });
        }
        self.allocator().advance_past(max_id);

        tracing::info!(atoms = snapshot.atoms.len(), "imported snapshot");
        Ok(())
    }
}

fn record_parts(record: &AtomRecord) -> (String, AtomContent) {
    match record {
        AtomRecord::Node {
            atom_type, name, ..
        } => (
            atom_type.clone(),
            AtomContent::Node { name: name.clone() },
        ),
        AtomRecord::Link {
            atom_type,
            outgoing,
            ..
        } => (
            atom_type.clone(),
            AtomContent::Link {
                outgoing: outgoing
                    .iter()
                    .filter_map(|&raw| AtomId::new(raw))
                    .collect(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::types;
    use crate::space::RemovePolicy;

    fn sample_space() -> AtomSpace {
        let space = AtomSpace::new();
        space
            .add_concept("AI", Some(TruthValue::new(0.9, 0.8)))
            .unwrap();
        space.add_inheritance("ML", "AI", None).unwrap();
        space.add_evaluation("helps", &["AI", "Human"], None).unwrap();
        space
    }

    #[test]
    fn export_is_topologically_ordered() {
        let space = sample_space();
        let snapshot = space.export();
        let mut seen = HashSet::new();
        for record in &snapshot.atoms {
            if let AtomRecord::Link { outgoing, .. } = record {
                for target in outgoing {
                    assert!(seen.contains(target), "link emitted before its target");
                }
            }
            seen.insert(record.id());
        }
        assert_eq!(snapshot.len(), space.len());
    }

    #[test]
    fn round_trip_reproduces_store() {
        let space = sample_space();
        let snapshot = space.export();

        let restored = AtomSpace::new();
        restored.import(&snapshot).unwrap();

        assert_eq!(restored.len(), space.len());
        for id in space.all_ids() {
            assert_eq!(restored.get(id).unwrap(), space.get(id).unwrap());
        }
        assert_eq!(restored.find_by_name("AI"), space.find_by_name("AI"));
        assert_eq!(
            restored.find_by_type(types::INHERITANCE),
            space.find_by_type(types::INHERITANCE)
        );
        // Freshly allocated ids continue past the imported ones.
        let next = restored.add_concept("new", None).unwrap();
        assert!(next.get() > space.len() as u64);
    }

    #[test]
    fn round_trip_survives_json() {
        let space = sample_space();
        let json = serde_json::to_string(&space.export()).unwrap();
        let snapshot: Snapshot = serde_json::from_str(&json).unwrap();

        let restored = AtomSpace::new();
        restored.import(&snapshot).unwrap();
        assert_eq!(restored.len(), space.len());
    }

    #[test]
    fn import_rejects_forward_reference() {
        let snapshot = Snapshot {
            atoms: vec![AtomRecord::Link {
                id: 1,
                atom_type: types::LIST.into(),
                outgoing: vec![2],
                truth_value: TruthValue::CERTAIN,
            }],
        };
        let space = AtomSpace::new();
        let err = space.import(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ThothError::Space(SpaceError::InvalidSnapshot { index: 0, .. })
        ));
        assert!(space.is_empty());
    }

    #[test]
    fn import_rejects_duplicate_id() {
        let snapshot = Snapshot {
            atoms: vec![
                AtomRecord::Node {
                    id: 1,
                    atom_type: types::CONCEPT.into(),
                    name: "A".into(),
                    truth_value: TruthValue::CERTAIN,
                },
                AtomRecord::Node {
                    id: 1,
                    atom_type: types::CONCEPT.into(),
                    name: "B".into(),
                    truth_value: TruthValue::CERTAIN,
                },
            ],
        };
        let space = AtomSpace::new();
        assert!(space.import(&snapshot).is_err());
        assert!(space.is_empty());
    }

    #[test]
    fn failed_import_leaves_existing_store_intact() {
        let space = AtomSpace::new();
        let existing = space.add_concept("A", None).unwrap();

        let snapshot = Snapshot {
            atoms: vec![
                AtomRecord::Node {
                    id: 10,
                    atom_type: types::CONCEPT.into(),
                    name: "B".into(),
                    truth_value: TruthValue::CERTAIN,
                },
                // Collides with the already present id.
                AtomRecord::Node {
                    id: existing.get(),
                    atom_type: types::CONCEPT.into(),
                    name: "C".into(),
                    truth_value: TruthValue::CERTAIN,
                },
            ],
        };
        assert!(space.import(&snapshot).is_err());
        assert_eq!(space.len(), 1);
        assert!(space.find_by_name("B").is_empty());
    }

    #[test]
    fn import_extends_existing_store() {
        let space = AtomSpace::new();
        let a = space.add_concept("A", None).unwrap();

        let snapshot = Snapshot {
            atoms: vec![AtomRecord::Link {
                id: 50,
                atom_type: types::LIST.into(),
                // References an atom already present, not in the snapshot.
                outgoing: vec![a.get()],
                truth_value: TruthValue::CERTAIN,
            }],
        };
        space.import(&snapshot).unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(
            space.incoming_of(a).unwrap(),
            vec![AtomId::new(50).unwrap()]
        );
    }

    #[test]
    fn export_after_removal_skips_removed() {
        let space = sample_space();
        let evals = space.find_by_type(types::EVALUATION);
        space.remove(evals[0], RemovePolicy::Restrict).unwrap();
        let snapshot = space.export();
        assert_eq!(snapshot.len(), space.len());
        assert!(snapshot.atoms.iter().all(|r| r.id() != evals[0].get()));
    }
}
