//! Rule relevance scoring
//!
//! A rule's score is a pure function of three inputs in [0, 1]:
//! the criticality of the columns it governs, the confidence in the
//! statistics behind it, and its specificity. Uncertain provenance
//! (robust fallback, small sample, dictionary/sample conflict) only ever
//! multiplies confidence down, so the score is monotone in it.

use crate::classify::SensitivityAssignment;
use crate::config::{PrivacyLevel, ScoringConfig};
use crate::profile::ColumnStatistics;
use serde::{Deserialize, Serialize};

/// Inputs to the score function
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub criticality: f64,
    pub confidence: f64,
    pub specificity: f64,
}

impl ScoreInputs {
    pub fn new(criticality: f64, confidence: f64, specificity: f64) -> Self {
        Self {
            criticality: criticality.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            specificity: specificity.clamp(0.0, 1.0),
        }
    }

    /// Multiply confidence by a penalty factor
    pub fn penalize(self, factor: f64) -> Self {
        Self {
            confidence: (self.confidence * factor).clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn with_specificity(self, specificity: f64) -> Self {
        Self {
            specificity: specificity.clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Weighted combination of the inputs, normalized by the total weight
pub fn score(inputs: ScoreInputs, weights: &ScoringConfig) -> f64 {
    let total = weights.criticality_weight + weights.confidence_weight + weights.specificity_weight;
    if total <= 0.0 {
        return 0.0;
    }
    let weighted = weights.criticality_weight * inputs.criticality
        + weights.confidence_weight * inputs.confidence
        + weights.specificity_weight * inputs.specificity;
    (weighted / total).clamp(0.0, 1.0)
}

/// Criticality of a column from its sensitivity classification
pub fn criticality(sensitivity: &SensitivityAssignment) -> f64 {
    if sensitivity.critical_field.value {
        return 1.0;
    }
    match sensitivity.privacy_level.value {
        PrivacyLevel::High => 0.9,
        PrivacyLevel::Medium => 0.6,
        PrivacyLevel::Low => 0.3,
    }
}

/// Confidence in a column's statistics after fallback and small-sample penalties
pub fn confidence(stats: &ColumnStatistics, weights: &ScoringConfig) -> f64 {
    let mut confidence = 1.0;
    if stats.robust_fallback_used {
        confidence *= weights.fallback_penalty;
    }
    if stats.low_confidence {
        confidence *= weights.small_sample_penalty;
    }
    confidence
}
