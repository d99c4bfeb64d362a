//! govinfer configuration management
//!
//! Every threshold the pipeline consumes lives here with a built-in default,
//! so an empty (or absent) configuration file yields a working engine.

use crate::classify::keywords::KeywordTables;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Profiler configuration
    pub profiling: ProfilingConfig,

    /// Rule synthesis thresholds
    pub thresholds: ThresholdConfig,

    /// Dictionary/sample conflict resolution
    pub conflicts: ConflictConfig,

    /// Rule scoring weights and penalties
    pub scoring: ScoringConfig,

    /// Rule set refinement
    pub refinement: RefinementConfig,

    /// Privacy defaults
    pub privacy: PrivacyConfig,

    /// Sample-size recommendation
    pub sampling: SamplingConfig,

    /// Policy metadata
    pub metadata: MetadataConfig,

    /// Keyword lookup tables
    pub keywords: KeywordTables,
}

impl EngineConfig {
    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let p = &self.profiling;
        check_positive_ratio("profiling.numeric_parse_ratio", p.numeric_parse_ratio)?;
        check_positive_ratio("profiling.datetime_parse_ratio", p.datetime_parse_ratio)?;
        check_ratio("profiling.identifier_uniqueness", p.identifier_uniqueness)?;
        if p.min_sample_size == 0 {
            return Err(Error::Config(
                "profiling.min_sample_size must be at least 1".to_string(),
            ));
        }
        if p.category_observation_limit == 0 {
            return Err(Error::Config(
                "profiling.category_observation_limit must be at least 1".to_string(),
            ));
        }

        let t = &self.thresholds;
        if !(t.z_multiplier.is_finite() && t.z_multiplier > 0.0) {
            return Err(Error::Config(format!(
                "thresholds.z_multiplier must be positive, got {}",
                t.z_multiplier
            )));
        }
        if !(0.0 < t.lower_percentile && t.lower_percentile < t.upper_percentile && t.upper_percentile < 1.0) {
            return Err(Error::Config(format!(
                "percentile bounds must satisfy 0 < lower < upper < 1, got [{}, {}]",
                t.lower_percentile, t.upper_percentile
            )));
        }
        check_ratio("thresholds.fact_max_null_rate", t.fact_max_null_rate)?;
        check_ratio("thresholds.fact_min_variability", t.fact_min_variability)?;
        check_ratio("thresholds.near_zero_null_rate", t.near_zero_null_rate)?;
        check_ratio("thresholds.content_match_ratio", t.content_match_ratio)?;
        check_ratio(
            "thresholds.consistency_violation_tolerance",
            t.consistency_violation_tolerance,
        )?;

        let c = &self.conflicts;
        if !(c.plausibility_multiple.is_finite() && c.plausibility_multiple >= 1.0) {
            return Err(Error::Config(format!(
                "conflicts.plausibility_multiple must be >= 1, got {}",
                c.plausibility_multiple
            )));
        }
        check_ratio("conflicts.min_overlap_ratio", c.min_overlap_ratio)?;

        let s = &self.scoring;
        for (name, value) in [
            ("scoring.criticality_weight", s.criticality_weight),
            ("scoring.confidence_weight", s.confidence_weight),
            ("scoring.specificity_weight", s.specificity_weight),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!("{name} must be non-negative")));
            }
        }
        if s.criticality_weight + s.confidence_weight + s.specificity_weight <= 0.0 {
            return Err(Error::Config(
                "scoring weights must not all be zero".to_string(),
            ));
        }
        check_ratio("scoring.fallback_penalty", s.fallback_penalty)?;
        check_ratio("scoring.small_sample_penalty", s.small_sample_penalty)?;
        check_ratio("scoring.conflict_penalty", s.conflict_penalty)?;

        crate::profile::sampling::z_value(self.sampling.confidence_level)?;
        let margin = self.sampling.margin_error;
        if !(margin > 0.0 && margin < 1.0) {
            return Err(Error::Config(format!(
                "sampling.margin_error must lie in (0, 1), got {margin}"
            )));
        }
        check_ratio("sampling.estimated_p", self.sampling.estimated_p)?;

        Ok(())
    }
}

fn check_ratio(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must lie in [0, 1], got {value}")))
    }
}

/// A share that must be strictly positive: `(0, 1]`
fn check_positive_ratio(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must lie in (0, 1], got {value}")))
    }
}

/// Profiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Below this many valid values statistics are flagged low-confidence
    pub min_sample_size: usize,

    /// Fraction of non-null values that must parse as numbers
    pub numeric_parse_ratio: f64,

    /// Fraction of non-null values that must parse as dates
    pub datetime_parse_ratio: f64,

    /// Maximum distinct categories retained per column
    pub category_observation_limit: usize,

    /// Distinct/valid ratio at which a text column looks like an identifier
    pub identifier_uniqueness: f64,

    /// Values inspected by content-based sensitivity detection
    pub content_scan_limit: usize,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 30,
            numeric_parse_ratio: 0.9,
            datetime_parse_ratio: 0.9,
            category_observation_limit: 50,
            identifier_uniqueness: 0.95,
            content_scan_limit: 50,
        }
    }
}

/// Rule synthesis thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Multiplier k for mean +/- k*stddev range bounds
    pub z_multiplier: f64,

    /// Lower percentile used by the robust fallback
    pub lower_percentile: f64,

    /// Upper percentile used by the robust fallback
    pub upper_percentile: f64,

    /// Maximum cardinality for categorical membership rules
    pub categorical_cardinality: usize,

    /// Numeric columns above this null rate are not treated as facts
    pub fact_max_null_rate: f64,

    /// Minimum distinct/valid ratio for a numeric fact
    pub fact_min_variability: f64,

    /// Null rates at or below this count as "no nulls"
    pub near_zero_null_rate: f64,

    /// Fraction of scanned values that must match a sensitive pattern
    pub content_match_ratio: f64,

    /// Age that separates minors from adults in consistency rules
    pub adult_age: f64,

    /// Highest income expected for minors
    pub minor_income_ceiling: f64,

    /// Highest fraction of contradicting rows a consistency rule tolerates
    pub consistency_violation_tolerance: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            z_multiplier: 3.0,
            lower_percentile: 0.01,
            upper_percentile: 0.99,
            categorical_cardinality: 20,
            fact_max_null_rate: 0.5,
            fact_min_variability: 0.05,
            near_zero_null_rate: 0.01,
            content_match_ratio: 0.3,
            adult_age: 18.0,
            minor_income_ceiling: 0.0,
            consistency_violation_tolerance: 0.05,
        }
    }
}

/// Dictionary/sample conflict resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Declared width may be at most this multiple of the observed width
    pub plausibility_multiple: f64,

    /// Share of the observed robust interval the declared bounds must cover
    pub min_overlap_ratio: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            plausibility_multiple: 10.0,
            min_overlap_ratio: 0.5,
        }
    }
}

/// Rule scoring weights and penalties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub criticality_weight: f64,
    pub confidence_weight: f64,
    pub specificity_weight: f64,

    /// Confidence multiplier when percentile bounds replaced z-score bounds
    pub fallback_penalty: f64,

    /// Confidence multiplier when the sample is below the minimum size
    pub small_sample_penalty: f64,

    /// Confidence multiplier when dictionary and sample disagree
    pub conflict_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            criticality_weight: 0.3,
            confidence_weight: 0.4,
            specificity_weight: 0.3,
            fallback_penalty: 0.75,
            small_sample_penalty: 0.6,
            conflict_penalty: 0.7,
        }
    }
}

/// Rule set refinement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Rule budget; critical-field governance rules are exempt
    pub max_rules: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self { max_rules: 50 }
    }
}

/// Privacy level of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Privacy defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Level assigned when no heuristic applies
    pub default_level: PrivacyLevel,

    /// Retention periods
    pub retention: RetentionConfig,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            default_level: PrivacyLevel::Medium,
            retention: RetentionConfig::default(),
        }
    }
}

/// Data retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Retention period for low/medium privacy fields in days
    pub normal_days: u32,

    /// Retention period for high privacy fields in days
    pub sensitive_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            normal_days: 365,
            sensitive_days: 90,
        }
    }
}

/// Sample-size recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// One of 0.90, 0.95, 0.99
    pub confidence_level: f64,
    pub margin_error: f64,
    pub estimated_p: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            margin_error: 0.05,
            estimated_p: 0.5,
        }
    }
}

/// Policy metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Provenance tag recorded for the data source
    pub data_source: String,

    /// Schema/version marker of the emitted document
    pub schema_version: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            data_source: "inferred".to_string(),
            schema_version: "1.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.thresholds.categorical_cardinality, 20);
        assert_eq!(config.refinement.max_rules, 50);
        assert_eq!(config.privacy.default_level, PrivacyLevel::Medium);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.profiling.min_sample_size, 30);
        assert_eq!(config.metadata.data_source, "inferred");
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [thresholds]
            categorical_cardinality = 5

            [refinement]
            max_rules = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.categorical_cardinality, 5);
        assert_eq!(config.thresholds.z_multiplier, 3.0);
        assert_eq!(config.refinement.max_rules, 10);
    }

    #[test]
    fn test_invalid_percentiles_rejected() {
        let mut config = EngineConfig::default();
        config.thresholds.lower_percentile = 0.99;
        config.thresholds.upper_percentile = 0.01;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let mut config = EngineConfig::default();
        config.scoring.criticality_weight = 0.0;
        config.scoring.confidence_weight = 0.0;
        config.scoring.specificity_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_parse_ratios_rejected() {
        let mut config = EngineConfig::default();
        config.profiling.numeric_parse_ratio = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EngineConfig::default();
        config.profiling.datetime_parse_ratio = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_margin_error_bounds() {
        for margin in [0.0, 1.0, -0.05] {
            let mut config = EngineConfig::default();
            config.sampling.margin_error = margin;
            assert!(config.validate().is_err(), "margin {margin} accepted");
        }
        let mut config = EngineConfig::default();
        config.sampling.margin_error = 0.03;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_confidence_level_rejected() {
        let mut config = EngineConfig::default();
        config.sampling.confidence_level = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[privacy]\ndefault_level = \"low\"").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.privacy.default_level, PrivacyLevel::Low);
        assert_eq!(config.privacy.retention.sensitive_days, 90);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = EngineConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.keywords.version, config.keywords.version);
    }
}
