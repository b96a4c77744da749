//! Graded belief values attached to every atom.
//!
//! A [`TruthValue`] is a (strength, confidence) pair in [0,1]². Strength is
//! the degree to which the statement holds; confidence is the weight of
//! evidence behind that strength. New atoms without an explicit truth value
//! default to certain: `{1.0, 1.0}`.

use serde::{Deserialize, Serialize};

/// A (strength, confidence) pair expressing graded belief.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    /// Degree to which the statement holds, in [0,1].
    pub strength: f32,
    /// Weight of evidence behind the strength, in [0,1].
    pub confidence: f32,
}

impl TruthValue {
    /// Create a truth value, clamping both components into [0,1].
    pub fn new(strength: f32, confidence: f32) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The certain truth value `{1.0, 1.0}`, assigned to atoms created
    /// without an explicit value.
    pub const CERTAIN: TruthValue = TruthValue {
        strength: 1.0,
        confidence: 1.0,
    };

    /// Merge independent evidence into this value.
    ///
    /// Strength becomes the confidence-weighted average of the two strengths;
    /// confidence accumulates as `min(1, c1 + c2·(1−c1))`. When both
    /// confidences are zero there is no evidence to weigh, so the existing
    /// strength is kept.
    pub fn merge(self, other: TruthValue) -> TruthValue {
        let total = self.confidence + other.confidence;
        let strength = if total > 0.0 {
            (self.strength * self.confidence + other.strength * other.confidence) / total
        } else {
            self.strength
        };
        let confidence = (self.confidence + other.confidence * (1.0 - self.confidence)).min(1.0);
        TruthValue::new(strength, confidence)
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self::CERTAIN
    }
}

impl std::fmt::Display for TruthValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{:.3}, {:.3}>", self.strength, self.confidence)
    }
}
