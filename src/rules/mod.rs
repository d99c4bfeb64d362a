//! Rule synthesis and refinement
//!
//! Candidates are produced per column (in parallel) and per column group
//! (after a barrier), reconciled against the dictionary, then deduplicated,
//! ranked and cut to the rule budget. Includes:
//! - Rule data types and builder
//! - Pure score function
//! - Single-column synthesizer
//! - Cross-column consistency pattern registry
//! - Dictionary/sample conflict resolver
//! - Refiner (dedup, rank, budget)

pub mod conflict;
pub mod patterns;
pub mod refiner;
pub mod rule;
pub mod scoring;
pub mod synthesizer;

pub use conflict::{ConflictOutcome, ConflictRecord, ConflictResolver, Resolution};
pub use patterns::{default_patterns, ConsistencyPattern, PatternEnv, PatternRegistry};
pub use refiner::Refiner;
pub use rule::{Comparison, LogicalOperator, Predicate, Rule, RuleBuilder, RuleKind};
pub use scoring::{score, ScoreInputs};
pub use synthesizer::{
    BoundMethod, Candidate, MembershipEvidence, RangeEvidence, Synthesizer, UnappliedDeclaration,
};

use crate::classify::FieldClassification;
use crate::dictionary::DictionaryEntry;
use crate::profile::{ColumnSample, ColumnStatistics};

/// Everything known about one column when synthesizing rules
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub sample: &'a ColumnSample,
    pub stats: &'a ColumnStatistics,
    pub field: &'a FieldClassification,
    pub entry: Option<&'a DictionaryEntry>,
}

impl ColumnContext<'_> {
    pub fn name(&self) -> &str {
        &self.stats.name
    }
}
