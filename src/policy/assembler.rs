//! Policy assembly and structural validation

use super::document::{
    fingerprint, ComplianceSummary, DatasetMetadata, FieldEntry, IntegrityFlags, Policy,
    RetentionPolicy,
};
use crate::classify::{assess_risk, FieldClassification};
use crate::config::{EngineConfig, PrivacyLevel};
use crate::dictionary::DataDictionary;
use crate::error::{Error, Result};
use crate::profile::{ColumnStatistics, Dataset};
use crate::rules::{ConflictRecord, Rule};
use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

/// Everything a run produced, ready to be assembled
pub struct Assembly<'a> {
    pub dataset: &'a Dataset,
    pub dictionary: Option<&'a DataDictionary>,
    /// One per column, in column order
    pub statistics: Vec<ColumnStatistics>,
    /// One per column, in column order
    pub fields: Vec<FieldClassification>,
    /// Refined rules in rank order
    pub rules: Vec<Rule>,
    pub conflicts: Vec<ConflictRecord>,
    /// Run-level caveats gathered by earlier stages
    pub caveats: Vec<String>,
    pub recommended_sample_size: Option<usize>,
}

/// Builds the final [`Policy`]
pub struct PolicyAssembler<'a> {
    config: &'a EngineConfig,
}

impl<'a> PolicyAssembler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Merge field classifications and rules into a validated policy.
    ///
    /// Structural violations (dangling column references, duplicate rule
    /// names, scores outside [0, 1], empty conditions) are an
    /// [`Error::InternalInvariant`].
    pub fn assemble(&self, input: Assembly<'_>) -> Result<Policy> {
        let Assembly {
            dataset,
            dictionary,
            statistics,
            fields,
            rules,
            conflicts,
            mut caveats,
            recommended_sample_size,
        } = input;

        let columns = dataset.columns();
        if statistics.len() != columns.len() || fields.len() != columns.len() {
            return Err(Error::InternalInvariant(format!(
                "expected {} field classifications, got {} statistics and {} fields",
                columns.len(),
                statistics.len(),
                fields.len()
            )));
        }
        for ((column, stats), field) in columns.iter().zip(&statistics).zip(&fields) {
            if stats.name != column.name || field.name != column.name {
                return Err(Error::InternalInvariant(format!(
                    "field order diverged from column order at '{}'",
                    column.name
                )));
            }
        }

        validate_rules(&rules, dataset)?;

        for stats in &statistics {
            for caveat in &stats.caveats {
                caveats.push(format!("{}: {}", stats.name, caveat));
            }
        }
        if let Some(dictionary) = dictionary {
            for declared in dictionary.columns() {
                let known = columns.iter().any(|c| c.name.trim().to_lowercase() == declared);
                if !known {
                    caveats.push(format!(
                        "Dictionary entry '{declared}' does not match any sampled column and was ignored."
                    ));
                }
            }
        }

        let entries: Vec<FieldEntry> = statistics
            .into_iter()
            .zip(fields)
            .map(|(stats, field)| {
                let description = dictionary
                    .and_then(|d| d.get(&field.name))
                    .and_then(|e| e.description.clone());
                self.field_entry(stats, field, description)
            })
            .collect();

        let frameworks: BTreeSet<_> = entries
            .iter()
            .flat_map(|e| e.compliance_tags.value.iter().copied())
            .collect();
        let risk_level = assess_risk(entries.iter().map(|e| e.privacy_level.value));
        let fingerprint = fingerprint(&entries, &rules)?;

        let metadata = DatasetMetadata {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            row_count: dataset.row_count(),
            column_count: dataset.column_count(),
            population_total: dataset.population_total(),
            recommended_sample_size,
            data_source: self.config.metadata.data_source.clone(),
            schema_version: self.config.metadata.schema_version.clone(),
            keyword_tables_version: self.config.keywords.version.clone(),
            dictionary: dictionary.and_then(|d| d.name().map(str::to_string)),
            caveats,
            conflicts,
            compliance: ComplianceSummary {
                frameworks,
                risk_level,
            },
            fingerprint,
        };

        tracing::info!(
            fields = entries.len(),
            rules = rules.len(),
            risk = %metadata.compliance.risk_level,
            fingerprint = %metadata.fingerprint,
            "Assembled policy"
        );
        Ok(Policy::new(metadata, entries, rules))
    }

    fn field_entry(
        &self,
        stats: ColumnStatistics,
        field: FieldClassification,
        description: Option<String>,
    ) -> FieldEntry {
        let role = field.role;
        let sensitivity = field.sensitivity;
        let retention = &self.config.privacy.retention;

        let integrity = IntegrityFlags {
            unique: stats.all_unique(),
            no_nulls: stats.count > 0 && stats.count == stats.total,
            consistent_format: stats.consistent_format,
            contains_outliers: stats.numeric.as_ref().is_some_and(|n| n.outlier_count > 0),
        };
        let days = if sensitivity.privacy_level.value == PrivacyLevel::High {
            retention.sensitive_days
        } else {
            retention.normal_days
        };

        let mut justification = vec![
            format!(
                "Role {} ({}), type {} ({}).",
                role.role.value, role.role.source, role.field_type.value, role.field_type.source
            ),
            format!(
                "Privacy {} ({}); critical {} ({}).",
                sensitivity.privacy_level.value,
                sensitivity.privacy_level.source,
                sensitivity.critical_field.value,
                sensitivity.critical_field.source
            ),
        ];
        if let Some(domain) = &role.domain {
            justification.push(format!("Name matches the canonical {} domain.", domain.name));
        }
        if let Some(found) = &sensitivity.content_match {
            justification.push(if found.embedded {
                format!(
                    "{:.0}% of scanned values contain {} values within free text.",
                    found.ratio * 100.0,
                    found.pattern
                )
            } else {
                format!(
                    "{:.0}% of scanned values look like {} values.",
                    found.ratio * 100.0,
                    found.pattern
                )
            });
        }
        if stats.low_confidence {
            justification.push(format!(
                "Statistics are low-confidence: {} valid values observed.",
                stats.count
            ));
        } else if stats.robust_fallback_used {
            justification.push("Percentile bounds replace mean/stddev bounds.".to_string());
        }

        FieldEntry {
            name: field.name,
            inferred_type: role.field_type,
            role: role.role,
            temporal: role.temporal.value,
            domain: role.domain.map(|d| d.name),
            privacy_level: sensitivity.privacy_level,
            security: sensitivity.security,
            transparency: sensitivity.transparency,
            access_restriction: sensitivity.access_restriction,
            data_subject: !sensitivity.compliance_tags.value.is_empty(),
            compliance_tags: sensitivity.compliance_tags,
            critical_field: sensitivity.critical_field,
            integrity,
            retention_policy: RetentionPolicy {
                label: "default".to_string(),
                days,
            },
            description,
            statistics: stats,
            justification: justification.join(" "),
        }
    }
}

/// Structural checks every emitted rule set must pass
pub fn validate_rules(rules: &[Rule], dataset: &Dataset) -> Result<()> {
    let mut names = HashSet::new();
    for rule in rules {
        if !names.insert(rule.rule_name.as_str()) {
            return Err(invariant(format!("duplicate rule name '{}'", rule.rule_name)));
        }
        if rule.conditions.is_empty() {
            return Err(invariant(format!("rule '{}' has no conditions", rule.rule_name)));
        }
        if !(0.0..=1.0).contains(&rule.score) {
            return Err(invariant(format!(
                "rule '{}' has score {} outside [0, 1]",
                rule.rule_name, rule.score
            )));
        }
        if rule.applies_to.is_empty() {
            return Err(invariant(format!("rule '{}' applies to no column", rule.rule_name)));
        }
        if let Some(missing) = rule.applies_to.iter().find(|c| dataset.column(c).is_none()) {
            return Err(invariant(format!(
                "rule '{}' references unknown column '{}'",
                rule.rule_name, missing
            )));
        }
    }
    Ok(())
}

fn invariant(message: String) -> Error {
    tracing::warn!(%message, "Policy failed structural validation");
    Error::InternalInvariant(message)
}
