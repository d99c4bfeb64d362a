//! Provenance tagging for classified attributes

use serde::{Deserialize, Serialize};

/// Where an inferred value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Declared in the data dictionary
    Dictionary,
    /// Derived from column-name keywords
    NameHeuristic,
    /// Derived from observed statistics or a configured default
    StatisticalDefault,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dictionary => write!(f, "dictionary"),
            Self::NameHeuristic => write!(f, "name heuristic"),
            Self::StatisticalDefault => write!(f, "statistical default"),
        }
    }
}

/// A value together with its provenance.
///
/// A declared `false` is `Sourced { value: false, source: Dictionary }`;
/// nothing is ever inferred from the absence of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }

    pub fn dictionary(value: T) -> Self {
        Self::new(value, Source::Dictionary)
    }

    pub fn name_heuristic(value: T) -> Self {
        Self::new(value, Source::NameHeuristic)
    }

    pub fn statistical_default(value: T) -> Self {
        Self::new(value, Source::StatisticalDefault)
    }

    /// Transform the value, keeping its provenance
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced::new(f(self.value), self.source)
    }

    /// Whether the value was declared rather than inferred
    pub fn is_declared(&self) -> bool {
        self.source == Source::Dictionary
    }
}
