//! Sensitivity classifier
//!
//! Assigns privacy level, criticality, access restriction and compliance
//! tags per column from dictionary hints, name tokens and the observed
//! values themselves (regex content patterns). Free text is searched for
//! regulated values embedded in it as well; such a match raises privacy
//! but never yields a format rule.

use super::compliance::{content_patterns, ComplianceFramework};
use super::keywords::{tokenize, KeywordTables};
use super::provenance::{Source, Sourced};
use super::role::{Role, RoleAssignment};
use crate::config::{EngineConfig, PrivacyConfig, PrivacyLevel, ProfilingConfig, ThresholdConfig};
use crate::dictionary::DictionaryEntry;
use crate::error::{Error, Result};
use crate::profile::{ColumnSample, ColumnStatistics, DType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Who may read a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRestriction {
    Public,
    Internal,
    Restricted,
}

impl From<PrivacyLevel> for AccessRestriction {
    fn from(level: PrivacyLevel) -> Self {
        match level {
            PrivacyLevel::Low => Self::Public,
            PrivacyLevel::Medium => Self::Internal,
            PrivacyLevel::High => Self::Restricted,
        }
    }
}

/// Protection applied to stored values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPosture {
    Encrypted,
    Masked,
    None,
}

impl From<PrivacyLevel> for SecurityPosture {
    fn from(level: PrivacyLevel) -> Self {
        match level {
            PrivacyLevel::Low => Self::None,
            PrivacyLevel::Medium => Self::Masked,
            PrivacyLevel::High => Self::Encrypted,
        }
    }
}

/// Whether a field is published with its description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    Public,
    Internal,
}

/// Observed values matching a regulated-value pattern
#[derive(Debug, Clone, PartialEq)]
pub struct ContentMatch {
    /// Pattern name (`email`, `ssn`, ...)
    pub pattern: String,
    /// The regex the values matched
    pub regex: String,
    pub frameworks: Vec<ComplianceFramework>,
    /// Fraction of scanned values that matched
    pub ratio: f64,
    /// Strict enough to emit as a format rule
    pub enforceable: bool,
    /// Found inside longer text rather than as the whole value
    pub embedded: bool,
}

/// Output of the sensitivity classifier for one column
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityAssignment {
    pub privacy_level: Sourced<PrivacyLevel>,
    pub critical_field: Sourced<bool>,
    pub access_restriction: Sourced<AccessRestriction>,
    pub compliance_tags: Sourced<BTreeSet<ComplianceFramework>>,
    pub security: SecurityPosture,
    pub transparency: Transparency,
    pub content_match: Option<ContentMatch>,
}

struct CompiledPattern {
    name: &'static str,
    source: &'static str,
    regex: Regex,
    embedded: Option<Regex>,
    frameworks: &'static [ComplianceFramework],
    enforceable: bool,
}

/// Sensitivity classifier
pub struct SensitivityClassifier<'a> {
    patterns: Vec<CompiledPattern>,
    tables: &'a KeywordTables,
    thresholds: &'a ThresholdConfig,
    profiling: &'a ProfilingConfig,
    privacy: &'a PrivacyConfig,
}

impl<'a> SensitivityClassifier<'a> {
    /// Create a classifier, compiling the content patterns
    pub fn new(config: &'a EngineConfig) -> Result<Self> {
        let patterns = content_patterns()
            .into_iter()
            .map(|p| {
                let compile = |pattern: &str| {
                    Regex::new(pattern).map_err(|e| {
                        Error::Config(format!("Invalid regex pattern for '{}': {}", p.name, e))
                    })
                };
                Ok(CompiledPattern {
                    name: p.name,
                    source: p.pattern,
                    regex: compile(p.pattern)?,
                    embedded: p.embedded.map(compile).transpose()?,
                    frameworks: p.frameworks,
                    enforceable: p.enforceable,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            tables: &config.keywords,
            thresholds: &config.thresholds,
            profiling: &config.profiling,
            privacy: &config.privacy,
        })
    }

    /// Scan up to `content_scan_limit` textual values for regulated patterns
    pub fn detect_content(&self, column: &ColumnSample, stats: &ColumnStatistics) -> Option<ContentMatch> {
        if !matches!(
            stats.dtype_guess,
            DType::Categorical | DType::Text | DType::Identifier
        ) {
            return None;
        }
        let scanned: Vec<String> = column
            .values
            .iter()
            .filter(|v| !v.is_null())
            .take(self.profiling.content_scan_limit)
            .map(|v| v.render())
            .collect();
        if scanned.is_empty() {
            return None;
        }

        if let Some((pattern, ratio)) = self.best_match(&scanned, |p| Some(&p.regex)) {
            tracing::debug!(
                column = %column.name,
                pattern = pattern.name,
                ratio,
                "Detected sensitive content"
            );
            return Some(ContentMatch {
                pattern: pattern.name.to_string(),
                regex: pattern.source.to_string(),
                frameworks: pattern.frameworks.to_vec(),
                ratio,
                enforceable: pattern.enforceable,
                embedded: false,
            });
        }

        if !matches!(stats.dtype_guess, DType::Categorical | DType::Text) {
            return None;
        }
        let (pattern, ratio) = self.best_match(&scanned, |p| p.embedded.as_ref())?;
        tracing::debug!(
            column = %column.name,
            pattern = pattern.name,
            ratio,
            "Detected sensitive content embedded in text"
        );
        Some(ContentMatch {
            pattern: pattern.name.to_string(),
            regex: pattern.embedded.as_ref().map_or(pattern.source, Regex::as_str).to_string(),
            frameworks: pattern.frameworks.to_vec(),
            ratio,
            enforceable: false,
            embedded: true,
        })
    }

    /// The pattern matching the most scanned values, if it reaches
    /// `content_match_ratio`
    fn best_match<'p>(
        &'p self,
        scanned: &[String],
        regex_of: impl Fn(&'p CompiledPattern) -> Option<&'p Regex>,
    ) -> Option<(&'p CompiledPattern, f64)> {
        let mut best: Option<(&CompiledPattern, usize)> = None;
        for pattern in &self.patterns {
            let Some(regex) = regex_of(pattern) else {
                continue;
            };
            let hits = scanned.iter().filter(|v| regex.is_match(v)).count();
            if hits > best.map_or(0, |(_, n)| n) {
                best = Some((pattern, hits));
            }
        }
        let (pattern, hits) = best?;
        let ratio = hits as f64 / scanned.len() as f64;
        (ratio >= self.thresholds.content_match_ratio).then_some((pattern, ratio))
    }

    /// Classify one column
    pub fn classify(
        &self,
        column: &ColumnSample,
        stats: &ColumnStatistics,
        role: &RoleAssignment,
        entry: Option<&DictionaryEntry>,
    ) -> SensitivityAssignment {
        let tokens = tokenize(&stats.name);
        let t = self.tables;
        let content_match = self.detect_content(column, stats);

        let privacy_level = if let Some(level) = entry.and_then(|e| e.privacy) {
            Sourced::dictionary(level)
        } else if t.matches(&tokens, &t.high_privacy) {
            Sourced::name_heuristic(PrivacyLevel::High)
        } else if content_match.is_some() {
            Sourced::statistical_default(PrivacyLevel::High)
        } else if t.matches(&tokens, &t.medium_privacy) {
            Sourced::name_heuristic(PrivacyLevel::Medium)
        } else if t.matches(&tokens, &t.low_privacy) {
            Sourced::name_heuristic(PrivacyLevel::Low)
        } else {
            Sourced::statistical_default(self.privacy.default_level)
        };

        let critical_field = if let Some(critical) = entry.and_then(|e| e.critical) {
            Sourced::dictionary(critical)
        } else if privacy_level.value == PrivacyLevel::High {
            Sourced::new(true, privacy_level.source)
        } else {
            let key_like = role.role.value == Role::Identifier
                && stats.null_rate <= self.thresholds.near_zero_null_rate
                && stats.uniqueness() >= self.profiling.identifier_uniqueness;
            Sourced::statistical_default(key_like)
        };

        let compliance_tags = match entry.and_then(|e| e.compliance_tags.clone()) {
            Some(tags) => Sourced::dictionary(tags),
            None => {
                let mut tags = BTreeSet::new();
                let mut source = Source::StatisticalDefault;
                if privacy_level.value >= PrivacyLevel::Medium {
                    let by_name = t.frameworks_for(&tokens);
                    if !by_name.is_empty() {
                        source = Source::NameHeuristic;
                    }
                    tags.extend(by_name);
                }
                if let Some(found) = &content_match {
                    tags.extend(found.frameworks.iter().copied());
                }
                Sourced::new(tags, source)
            }
        };

        let transparency = if t.matches(&tokens, &t.public) {
            Transparency::Public
        } else {
            Transparency::Internal
        };

        tracing::debug!(
            column = %stats.name,
            privacy = %privacy_level.value,
            source = %privacy_level.source,
            critical = critical_field.value,
            "Classified sensitivity"
        );

        SensitivityAssignment {
            access_restriction: privacy_level.clone().map(AccessRestriction::from),
            security: SecurityPosture::from(privacy_level.value),
            privacy_level,
            critical_field,
            compliance_tags,
            transparency,
            content_match,
        }
    }
}
