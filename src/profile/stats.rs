//! Per-column statistics produced by the profiler

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Coarse data type guessed from observed values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Numeric,
    Categorical,
    Datetime,
    Boolean,
    Identifier,
    Text,
    Unknown,
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
            Self::Boolean => "boolean",
            Self::Identifier => "identifier",
            Self::Text => "text",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Descriptive and robust statistics for numeric columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two values
    pub stddev: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub p01: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p99: f64,
    /// Every value is a whole number
    pub is_integer: bool,
    /// Values outside the Tukey fences (1.5 x IQR)
    pub outlier_count: usize,
    pub negative_count: usize,
}

impl NumericSummary {
    /// Robust percentile interval `[p01, p99]`
    pub fn robust_bounds(&self) -> (f64, f64) {
        (self.p01, self.p99)
    }

    /// Whether the standard deviation is usable for z-score bounds
    pub fn has_usable_spread(&self) -> bool {
        self.stddev.is_some_and(|s| s.is_finite() && s > 0.0)
    }
}

/// Category observations for low-cardinality columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    /// Observed categories, capped at the observation limit
    pub observed_categories: BTreeSet<String>,
    /// More categories existed than the observation limit allowed
    pub truncated: bool,
    /// Most frequent value (ties resolved lexicographically)
    pub mode: Option<String>,
}

/// Length profile for textual columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSummary {
    pub min_length: usize,
    pub max_length: usize,
    /// All values consist only of ASCII digits
    pub all_digits: bool,
    /// All values are `[A-Za-z0-9_-]`
    pub all_word_chars: bool,
}

/// Statistics derived from one column of the sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Column name
    pub name: String,
    /// Total rows observed
    pub total: usize,
    /// Valid, non-null values (unparsable tokens count as null)
    pub count: usize,
    /// Fraction of rows that are null or unparsable (0-1)
    pub null_rate: f64,
    /// Distinct non-null values
    pub cardinality: usize,
    pub dtype_guess: DType,
    /// Every valid value followed one consistent representation
    pub consistent_format: bool,
    /// Percentile bounds must replace mean +/- k*stddev downstream
    pub robust_fallback_used: bool,
    /// `count` is below the minimum viable sample size
    pub low_confidence: bool,
    pub numeric: Option<NumericSummary>,
    pub categorical: Option<CategoricalSummary>,
    pub text: Option<TextSummary>,
    /// Datetime values all matched an ISO-8601 layout
    pub iso_datetime: bool,
    /// Human-readable quality caveats raised during profiling
    pub caveats: Vec<String>,
}

impl ColumnStatistics {
    /// Minimal conservative record for a column whose statistics could not
    /// be computed.
    pub fn unknown(name: impl Into<String>, total: usize, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total,
            count: 0,
            null_rate: 1.0,
            cardinality: 0,
            dtype_guess: DType::Unknown,
            consistent_format: false,
            robust_fallback_used: true,
            low_confidence: true,
            numeric: None,
            categorical: None,
            text: None,
            iso_datetime: false,
            caveats: vec![reason.into()],
        }
    }

    /// Ratio of distinct values to valid values (0 when empty)
    pub fn uniqueness(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.cardinality as f64 / self.count as f64
        }
    }

    /// All valid values are distinct
    pub fn all_unique(&self) -> bool {
        self.count > 0 && self.cardinality == self.count
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype_guess == DType::Numeric && self.numeric.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_conservative() {
        let stats = ColumnStatistics::unknown("broken", 10, "corrupt encoding");
        assert_eq!(stats.dtype_guess, DType::Unknown);
        assert!(stats.robust_fallback_used);
        assert!(stats.low_confidence);
        assert_eq!(stats.null_rate, 1.0);
        assert_eq!(stats.uniqueness(), 0.0);
        assert!(!stats.all_unique());
        assert_eq!(stats.caveats, vec!["corrupt encoding".to_string()]);
    }

    #[test]
    fn test_dtype_display() {
        assert_eq!(DType::Numeric.to_string(), "numeric");
        assert_eq!(DType::Identifier.to_string(), "identifier");
    }
}
