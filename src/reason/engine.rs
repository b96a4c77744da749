//! The reasoning engine facade.
//!
//! Holds the registered rules, the append-only inference log, and the two
//! tunables bounding forward chaining. Stateless between calls otherwise:
//! no suspended chain survives a return.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::atom::{Atom, AtomId};
use crate::error::ThothResult;
use crate::pattern::{Match, Pattern, PatternMatcher};
use crate::space::AtomSpace;

use super::rules::{Rule, default_rules};
use super::InferenceRecord;

/// Tunables for the reasoning engine.
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// Cap on forward-chaining rounds (default: 100). A safety valve for
    /// rule sets that are monotonic but slow to converge.
    pub max_iterations: usize,
    /// Derivations below this confidence are not emitted (default: 0.1).
    pub min_confidence: f32,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            min_confidence: 0.1,
        }
    }
}

/// Forward- and backward-chaining engine over one atom store.
///
/// Constructed with an explicit store reference; rules and the inference log
/// live for the engine's lifetime, atoms for the store's.
pub struct ReasoningEngine {
    space: Arc<AtomSpace>,
    rules: Vec<Rule>,
    log: Vec<InferenceRecord>,
    config: ReasonerConfig,
}

impl ReasoningEngine {
    /// Create an engine over the given store with default tunables.
    pub fn new(space: Arc<AtomSpace>) -> Self {
        Self::with_config(space, ReasonerConfig::default())
    }

    /// Create an engine with explicit tunables.
    pub fn with_config(space: Arc<AtomSpace>, config: ReasonerConfig) -> Self {
        Self {
            space,
            rules: Vec::new(),
            log: Vec::new(),
            config,
        }
    }

    /// The store this engine reasons over.
    pub fn space(&self) -> &AtomSpace {
        &self.space
    }

    pub(super) fn space_arc(&self) -> Arc<AtomSpace> {
        Arc::clone(&self.space)
    }

    pub(super) fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// Register a rule.
    ///
    /// Fails with `UnboundConclusionVariable` if the conclusion uses a
    /// variable no premise binds; rule order is insertion order and is the
    /// tie break for application within one forward-chaining round.
    pub fn add_rule(&mut self, rule: Rule) -> ThothResult<()> {
        rule.validate()?;
        tracing::debug!(rule = %rule.name, premises = rule.premises.len(), "registered rule");
        self.rules.push(rule);
        Ok(())
    }

    /// Register the built-in rule set (transitivity, deduction, symmetry).
    pub fn add_default_rules(&mut self) -> ThothResult<()> {
        for rule in default_rules() {
            self.add_rule(rule)?;
        }
        Ok(())
    }

    /// The registered rules, in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The append-only inference log, oldest first.
    pub fn log(&self) -> &[InferenceRecord] {
        &self.log
    }

    /// Drop the inference log. Rules and store content are unaffected.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub(super) fn push_log(&mut self, records: &[InferenceRecord]) {
        self.log.extend_from_slice(records);
    }

    /// Explain how an atom came to exist: the newest log record that
    /// produced it, or `None` for directly asserted atoms.
    pub fn explain_inference(&self, id: AtomId) -> Option<&InferenceRecord> {
        self.log
            .iter()
            .rev()
            .find(|record| record.resulting_atom_id == Some(id))
    }

    /// Free-text filter over node names.
    ///
    /// Returns every node whose name contains `text` (case-insensitive)
    /// plus everything directly linked to a hit, ascending by id. Pure
    /// index work: one name scan and one depth-1 connectivity call per hit,
    /// no inference.
    pub fn query_knowledge(&self, text: &str) -> ThothResult<Vec<Atom>> {
        let matcher = PatternMatcher::new(&self.space);
        let mut ids: BTreeSet<AtomId> = BTreeSet::new();
        for hit in self.space.find_name_contains(text) {
            ids.insert(hit);
            ids.extend(matcher.find_connected(hit, 1)?);
        }
        ids.into_iter().map(|id| self.space.get(id)).collect()
    }

    /// Match a `Type(name)`, `Type($var)`, or bare-name query string.
    ///
    /// Unparseable queries yield an empty result, mirroring the free-text
    /// surface this wraps.
    pub fn match_query(&self, query: &str) -> ThothResult<Vec<Match>> {
        let Some(pattern) = parse_query(query) else {
            return Ok(Vec::new());
        };
        PatternMatcher::new(&self.space).matches(&pattern)
    }
}

fn parse_query(query: &str) -> Option<Pattern> {
    static SHAPE_QUERY: OnceLock<Regex> = OnceLock::new();
    let re = SHAPE_QUERY
        .get_or_init(|| Regex::new(r"^(\w+)\(([^)]+)\)$").expect("query regex is valid"));

    let query = query.trim();
    if let Some(captures) = re.captures(query) {
        let atom_type = captures.get(1).map(|m| m.as_str())?;
        let inner = captures.get(2).map(|m| m.as_str().trim())?;
        if let Some(var_name) = inner.strip_prefix('$') {
            return Some(Pattern::var_typed(var_name, atom_type));
        }
        return Some(Pattern::Shape {
            atom_type: Some(atom_type.to_string()),
            name: Some(inner.to_string()),
            outgoing: None,
        });
    }
    if !query.is_empty() && !query.starts_with('$') {
        return Some(Pattern::Shape {
            atom_type: None,
            name: Some(query.to_string()),
            outgoing: None,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::types;

    fn engine_with_facts() -> ReasoningEngine {
        let space = Arc::new(AtomSpace::new());
        space.add_inheritance("ML", "AI", None).unwrap();
        space.add_concept("Robotics", None).unwrap();
        ReasoningEngine::new(space)
    }

    #[test]
    fn query_knowledge_returns_hits_and_neighbors() {
        let engine = engine_with_facts();
        let results = engine.query_knowledge("ml").unwrap();
        // The ML node plus the inheritance link referencing it.
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|a| a.name() == Some("ML")));
        assert!(results.iter().any(|a| a.atom_type == types::INHERITANCE));
        // Ascending id order.
        assert!(results[0].id < results[1].id);
    }

    #[test]
    fn query_knowledge_no_hits_is_empty() {
        let engine = engine_with_facts();
        assert!(engine.query_knowledge("quantum").unwrap().is_empty());
    }

    #[test]
    fn match_query_literal_name() {
        let engine = engine_with_facts();
        let matches = engine.match_query("ConceptNode(AI)").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].atom_id,
            engine.space().find_by_name("AI")[0]
        );
    }

    #[test]
    fn match_query_variable_binds_all_of_type() {
        let engine = engine_with_facts();
        let matches = engine.match_query("ConceptNode($x)").unwrap();
        assert_eq!(matches.len(), 3); // ML, AI, Robotics
        assert!(matches.iter().all(|m| m.bindings.contains_key("x")));
    }

    #[test]
    fn match_query_bare_name() {
        let engine = engine_with_facts();
        let matches = engine.match_query("Robotics").unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn match_query_unparseable_is_empty() {
        let engine = engine_with_facts();
        assert!(engine.match_query("$loose").unwrap().is_empty());
        assert!(engine.match_query("").unwrap().is_empty());
    }

    #[test]
    fn add_rule_rejects_invalid() {
        let mut engine = engine_with_facts();
        let bad = Rule::new(
            "bad",
            vec![Pattern::var("A")],
            Pattern::link(types::SIMILARITY, vec![Pattern::var("A"), Pattern::var("B")]),
        );
        assert!(engine.add_rule(bad).is_err());
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn default_rules_register_in_order() {
        let mut engine = engine_with_facts();
        engine.add_default_rules().unwrap();
        let names: Vec<&str> = engine.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["inheritance_transitivity", "deduction", "similarity_symmetry"]
        );
    }
}
