//! Declarative inference rules.
//!
//! A rule names a set of premise patterns and a conclusion pattern drawing
//! its variables from the premises. Rules are data registered into the
//! reasoning engine, not store content.

use crate::atom::types;
use crate::error::{ReasonError, ThothResult};
use crate::pattern::Pattern;

/// An inference rule: when every premise matches under one consistent
/// binding set, the conclusion holds with the rule's confidence factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub premises: Vec<Pattern>,
    pub conclusion: Pattern,
    /// Confidence factor multiplied into each derivation.
    pub confidence: f32,
}

impl Rule {
    /// Create a rule with full confidence.
    pub fn new(name: impl Into<String>, premises: Vec<Pattern>, conclusion: Pattern) -> Self {
        Self {
            name: name.into(),
            premises,
            conclusion,
            confidence: 1.0,
        }
    }

    /// Set the confidence factor, clamped into [0,1].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Validate the rule's patterns and variable discipline.
    ///
    /// Every variable in the conclusion must appear in at least one premise,
    /// otherwise forward chaining could never instantiate it.
    pub fn validate(&self) -> ThothResult<()> {
        for premise in &self.premises {
            premise.validate()?;
        }
        self.conclusion.validate()?;

        let premise_vars: Vec<String> = self
            .premises
            .iter()
            .flat_map(|p| p.variables())
            .collect();
        for variable in self.conclusion.variables() {
            if !premise_vars.contains(&variable) {
                return Err(ReasonError::UnboundConclusionVariable {
                    rule_name: self.name.clone(),
                    variable,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// The built-in rule set of the original cognitive agent: inheritance
/// transitivity, modus-ponens-style deduction, and similarity symmetry.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "inheritance_transitivity",
            vec![
                Pattern::link(
                    types::INHERITANCE,
                    vec![Pattern::var("A"), Pattern::var("B")],
                ),
                Pattern::link(
                    types::INHERITANCE,
                    vec![Pattern::var("B"), Pattern::var("C")],
                ),
            ],
            Pattern::link(
                types::INHERITANCE,
                vec![Pattern::var("A"), Pattern::var("C")],
            ),
        )
        .with_confidence(0.9),
        Rule::new(
            "deduction",
            vec![
                Pattern::link(
                    types::IMPLICATION,
                    vec![Pattern::var("A"), Pattern::var("B")],
                ),
                Pattern::link(types::EVALUATION, vec![Pattern::var("A")]),
            ],
            Pattern::link(types::EVALUATION, vec![Pattern::var("B")]),
        )
        .with_confidence(0.8),
        Rule::new(
            "similarity_symmetry",
            vec![Pattern::link(
                types::SIMILARITY,
                vec![Pattern::var("A"), Pattern::var("B")],
            )],
            Pattern::link(
                types::SIMILARITY,
                vec![Pattern::var("B"), Pattern::var("A")],
            ),
        ),
    ]
}
