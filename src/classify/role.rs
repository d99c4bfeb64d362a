//! Role classifier
//!
//! Decision order, first match wins:
//! 1. dictionary-declared role (or a role implied by the declared type)
//! 2. column-name keywords
//! 3. statistical signals (dtype, cardinality, null rate, variability)
//! 4. `dimension`
//!
//! Every column leaves with a role.

use super::keywords::{tokenize, DomainEntry, KeywordTables};
use super::provenance::Sourced;
use crate::config::{EngineConfig, ProfilingConfig, ThresholdConfig};
use crate::dictionary::DictionaryEntry;
use crate::profile::{ColumnStatistics, DType};
use serde::{Deserialize, Serialize};

/// Semantic role of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Measured quantity
    Fact,
    /// Descriptive attribute
    Dimension,
    /// Record key; validated for uniqueness/format only
    Identifier,
    Unknown,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fact => write!(f, "fact"),
            Self::Dimension => write!(f, "dimension"),
            Self::Identifier => write!(f, "identifier"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Output of the role classifier for one column
#[derive(Debug, Clone, PartialEq)]
pub struct RoleAssignment {
    pub role: Sourced<Role>,
    /// Coarse type: declared, or the profiler's guess
    pub field_type: Sourced<DType>,
    /// Recognized value domain for numeric, non-identifier columns
    pub domain: Option<DomainEntry>,
    /// Column holds dates or timestamps
    pub temporal: Sourced<bool>,
}

/// Role classifier
pub struct RoleClassifier<'a> {
    tables: &'a KeywordTables,
    thresholds: &'a ThresholdConfig,
    profiling: &'a ProfilingConfig,
}

impl<'a> RoleClassifier<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            tables: &config.keywords,
            thresholds: &config.thresholds,
            profiling: &config.profiling,
        }
    }

    /// Classify one column
    pub fn classify(&self, stats: &ColumnStatistics, entry: Option<&DictionaryEntry>) -> RoleAssignment {
        let tokens = tokenize(&stats.name);

        let field_type = match entry.and_then(|e| e.declared_type) {
            Some(declared) => Sourced::dictionary(declared),
            None => Sourced::statistical_default(stats.dtype_guess),
        };

        // Columns that could not be profiled get the conservative role whatever
        // their name or declaration says
        let role = if stats.dtype_guess == DType::Unknown {
            Sourced::statistical_default(Role::Dimension)
        } else {
            declared_role(entry)
                .or_else(|| self.role_from_name(&tokens, stats))
                .or_else(|| self.role_from_statistics(stats))
                .unwrap_or_else(|| Sourced::statistical_default(Role::Dimension))
        };

        let domain = if stats.is_numeric() && role.value != Role::Identifier {
            self.tables.domain_for(&tokens).cloned()
        } else {
            None
        };

        let temporal = match entry.and_then(|e| e.declared_type) {
            Some(declared) => Sourced::dictionary(declared == DType::Datetime),
            None if stats.dtype_guess == DType::Datetime => Sourced::statistical_default(true),
            None if matches!(stats.dtype_guess, DType::Categorical | DType::Text)
                && self.tables.matches(&tokens, &self.tables.date) =>
            {
                Sourced::name_heuristic(true)
            }
            None => Sourced::statistical_default(false),
        };

        tracing::debug!(
            column = %stats.name,
            role = %role.value,
            source = %role.source,
            domain = domain.as_ref().map(|d| d.name.as_str()),
            "Classified role"
        );

        RoleAssignment {
            role,
            field_type,
            domain,
            temporal,
        }
    }

    fn role_from_name(&self, tokens: &[String], stats: &ColumnStatistics) -> Option<Sourced<Role>> {
        let t = self.tables;
        let numeric = stats.is_numeric();

        if t.matches(tokens, &t.identifier) {
            return Some(Sourced::name_heuristic(Role::Identifier));
        }
        if t.matches(tokens, &t.weak_identifier) {
            let near_unique = stats.uniqueness() >= self.profiling.identifier_uniqueness
                && stats.count >= self.profiling.min_sample_size;
            let role = if near_unique { Role::Identifier } else { Role::Dimension };
            return Some(Sourced::name_heuristic(role));
        }
        if !numeric && t.matches(tokens, &t.date) {
            return Some(Sourced::name_heuristic(Role::Dimension));
        }
        if t.matches(tokens, &t.fact) || t.domain_for(tokens).is_some() {
            let role = if numeric { Role::Fact } else { Role::Dimension };
            return Some(Sourced::name_heuristic(role));
        }
        if t.matches(tokens, &t.dimension) {
            return Some(Sourced::name_heuristic(Role::Dimension));
        }
        None
    }

    fn role_from_statistics(&self, stats: &ColumnStatistics) -> Option<Sourced<Role>> {
        let role = match stats.dtype_guess {
            DType::Unknown => return None,
            DType::Identifier => Role::Identifier,
            DType::Numeric => {
                if stats.cardinality < self.thresholds.categorical_cardinality {
                    Role::Dimension
                } else if stats.null_rate < self.thresholds.fact_max_null_rate
                    && stats.uniqueness() >= self.thresholds.fact_min_variability
                {
                    Role::Fact
                } else {
                    Role::Dimension
                }
            }
            DType::Categorical | DType::Datetime | DType::Boolean | DType::Text => Role::Dimension,
        };
        Some(Sourced::statistical_default(role))
    }
}

/// Role declared outright, or implied by the declared type
fn declared_role(entry: Option<&DictionaryEntry>) -> Option<Sourced<Role>> {
    let entry = entry?;
    if let Some(role) = entry.role.filter(|r| *r != Role::Unknown) {
        return Some(Sourced::dictionary(role));
    }
    let role = match entry.declared_type? {
        DType::Identifier => Role::Identifier,
        DType::Numeric => Role::Fact,
        DType::Categorical | DType::Datetime | DType::Boolean | DType::Text => Role::Dimension,
        DType::Unknown => return None,
    };
    Some(Sourced::dictionary(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::provenance::Source;
    use crate::profile::{ColumnSample, Profiler};

    fn classify(column: ColumnSample, entry: Option<&DictionaryEntry>) -> RoleAssignment {
        let config = EngineConfig::default();
        let stats = Profiler::new(&config).profile(&column);
        RoleClassifier::new(&config).classify(&stats, entry)
    }

    fn spread(n: i64) -> Vec<i64> {
        (0..n).map(|i| 1000 + i * 37).collect()
    }

    #[test]
    fn test_dictionary_role_wins() {
        let entry = DictionaryEntry {
            role: Some(Role::Dimension),
            ..Default::default()
        };
        let assignment = classify(ColumnSample::new("income", spread(50)), Some(&entry));
        assert_eq!(assignment.role, Sourced::dictionary(Role::Dimension));
    }

    #[test]
    fn test_declared_type_implies_role() {
        let entry = DictionaryEntry {
            declared_type: Some(DType::Identifier),
            ..Default::default()
        };
        let assignment = classify(ColumnSample::new("acct", spread(50)), Some(&entry));
        assert_eq!(assignment.role, Sourced::dictionary(Role::Identifier));
        assert_eq!(assignment.field_type, Sourced::dictionary(DType::Identifier));
        assert!(assignment.domain.is_none());
    }

    #[test]
    fn test_name_heuristics() {
        let age = classify(ColumnSample::new("customer_age", (0..50_i64).map(|i| 18 + i % 40)), None);
        assert_eq!(age.role, Sourced::name_heuristic(Role::Fact));
        assert_eq!(age.domain.unwrap().name, "age");

        let id = classify(ColumnSample::new("CustomerID", spread(50)), None);
        assert_eq!(id.role, Sourced::name_heuristic(Role::Identifier));
        assert!(id.domain.is_none());

        let status = classify(ColumnSample::new("order_status", vec!["open", "closed"]), None);
        assert_eq!(status.role, Sourced::name_heuristic(Role::Dimension));
    }

    #[test]
    fn test_weak_identifier_needs_uniqueness() {
        let codes: Vec<String> = (0..40).map(|i| format!("Z{i:04}")).collect();
        let codes: Vec<&str> = codes.iter().map(String::as_str).collect();
        let unique = classify(ColumnSample::new("product_code", codes), None);
        assert_eq!(unique.role.value, Role::Identifier);

        let repeated: Vec<&str> = (0..40).map(|i| ["A1", "B2"][i % 2]).collect();
        let shared = classify(ColumnSample::new("zip_code", repeated), None);
        assert_eq!(shared.role.value, Role::Dimension);
    }

    #[test]
    fn test_unprofiled_column_is_dimension() {
        let entry = DictionaryEntry {
            declared_type: Some(DType::Identifier),
            ..Default::default()
        };
        let corrupt = ColumnSample::new("customer_id", vec!["C1", "C\u{FFFD}2", "C3"]);
        let declared = classify(corrupt.clone(), Some(&entry));
        assert_eq!(declared.role, Sourced::statistical_default(Role::Dimension));
        assert!(declared.domain.is_none());

        let by_name = classify(corrupt, None);
        assert_eq!(by_name.role, Sourced::statistical_default(Role::Dimension));

        let empty = classify(ColumnSample::new("order_id", vec![None::<i64>; 3]), None);
        assert_eq!(empty.role.value, Role::Dimension);
    }

    #[test]
    fn test_statistical_defaults() {
        let fact = classify(ColumnSample::new("zorblax", spread(50)), None);
        assert_eq!(fact.role, Sourced::statistical_default(Role::Fact));

        let low_card = classify(ColumnSample::new("zorblax", (0..50_i64).map(|i| i % 4)), None);
        assert_eq!(low_card.role, Sourced::statistical_default(Role::Dimension));

        let text = classify(ColumnSample::new("zorblax", vec!["a b", "c d", "a b"]), None);
        assert_eq!(text.role, Sourced::statistical_default(Role::Dimension));
    }

    #[test]
    fn test_unknown_column_defaults_to_dimension() {
        let assignment = classify(ColumnSample::new("zorblax", vec![None::<i64>; 4]), None);
        assert_eq!(assignment.role.value, Role::Dimension);
        assert_eq!(assignment.role.source, Source::StatisticalDefault);
        assert_eq!(assignment.field_type.value, DType::Unknown);
    }

    #[test]
    fn test_temporal_detection() {
        let dates = classify(ColumnSample::new("created", vec!["2024-01-01", "2024-01-02"]), None);
        assert_eq!(dates.temporal, Sourced::statistical_default(true));

        let by_name = classify(ColumnSample::new("signup_date", vec!["soon", "later", "soon"]), None);
        assert_eq!(by_name.temporal, Sourced::name_heuristic(true));

        let numbers = classify(ColumnSample::new("birth_year", spread(50)), None);
        assert!(!numbers.temporal.value);
    }
}
