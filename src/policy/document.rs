//! The policy document
//!
//! A [`Policy`] is built once per run by the assembler and never changes
//! afterwards: there are no setters, only accessors and serializers.

use crate::classify::{
    AccessRestriction, ComplianceFramework, RiskLevel, Role, SecurityPosture, Sourced, Transparency,
};
use crate::config::PrivacyLevel;
use crate::error::Result;
use crate::profile::{ColumnStatistics, DType};
use crate::rules::{ConflictRecord, Rule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Dataset-level compliance summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Union of all field compliance tags
    pub frameworks: BTreeSet<ComplianceFramework>,
    pub risk_level: RiskLevel,
}

/// Dataset-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Unique per run
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_sample_size: Option<usize>,
    /// Provenance tag of the sampled data
    pub data_source: String,
    pub schema_version: String,
    pub keyword_tables_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<String>,
    /// Quality caveats that apply to the whole run
    pub caveats: Vec<String>,
    /// Every dictionary/sample disagreement met during resolution
    pub conflicts: Vec<ConflictRecord>,
    pub compliance: ComplianceSummary,
    /// SHA-256 over fields and rules; equal for identical inputs
    pub fingerprint: String,
}

/// Structural integrity signals observed in the sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityFlags {
    pub unique: bool,
    pub no_nulls: bool,
    pub consistent_format: bool,
    pub contains_outliers: bool,
}

/// How long values of a field are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub label: String,
    pub days: u32,
}

/// Governance metadata for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub inferred_type: Sourced<DType>,
    pub role: Sourced<Role>,
    pub temporal: bool,
    /// Canonical value domain recognized from the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub privacy_level: Sourced<PrivacyLevel>,
    pub security: SecurityPosture,
    pub transparency: Transparency,
    pub access_restriction: Sourced<AccessRestriction>,
    pub compliance_tags: Sourced<BTreeSet<ComplianceFramework>>,
    pub critical_field: Sourced<bool>,
    /// The field holds data about an identifiable person
    pub data_subject: bool,
    pub integrity: IntegrityFlags,
    pub retention_policy: RetentionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub statistics: ColumnStatistics,
    pub justification: String,
}

/// Inferred data-governance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    metadata: DatasetMetadata,
    fields: Vec<FieldEntry>,
    rules: Vec<Rule>,
}

impl Policy {
    pub(crate) fn new(metadata: DatasetMetadata, fields: Vec<FieldEntry>, rules: Vec<Rule>) -> Self {
        Self {
            metadata,
            fields,
            rules,
        }
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Field entries in dataset column order
    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    /// Rules in rank order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_name == name)
    }

    /// Rules referencing a column
    pub fn rules_for<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.applies_to.contains(column))
    }

    pub fn fingerprint(&self) -> &str {
        &self.metadata.fingerprint
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Read back a serialized policy for auditing or comparison
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// SHA-256 (hex) over the canonical JSON of fields and rules
pub fn fingerprint(fields: &[FieldEntry], rules: &[Rule]) -> Result<String> {
    let canonical = serde_json::to_vec(&(fields, rules))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::PolicyEngine;
    use crate::profile::{ColumnSample, Dataset};

    fn policy() -> Policy {
        let dataset = Dataset::new(vec![
            ColumnSample::new("email", (0..40).map(|i| format!("u{i}@example.org")).collect::<Vec<_>>()),
            ColumnSample::new("segment", (0..40).map(|i| ["retail", "business"][i % 2]).collect::<Vec<_>>()),
        ])
        .unwrap();
        PolicyEngine::new(EngineConfig::default())
            .unwrap()
            .infer(&dataset, None)
            .unwrap()
    }

    #[test]
    fn test_json_roundtrip_keeps_fingerprint() {
        let policy = policy();
        let parsed = Policy::from_json(&policy.to_json().unwrap()).unwrap();
        assert_eq!(parsed.fingerprint(), policy.fingerprint());
        assert_eq!(parsed.metadata().run_id, policy.metadata().run_id);
        assert_eq!(parsed.rules().len(), policy.rules().len());
    }

    #[test]
    fn test_fingerprint_ignores_run_identity() {
        let policy = policy();
        let recomputed = fingerprint(policy.fields(), policy.rules()).unwrap();
        assert_eq!(recomputed, policy.fingerprint());
        assert_eq!(recomputed.len(), 64);
    }

    #[test]
    fn test_rules_for_column() {
        let policy = policy();
        assert!(policy.rules_for("segment").all(|r| r.applies_to.contains("segment")));
        assert!(policy.rules_for("missing").next().is_none());
        assert!(policy.field("email").is_some());
        assert!(policy.field("missing").is_none());
    }

    #[test]
    fn test_yaml_rendering() {
        let yaml = policy().to_yaml().unwrap();
        assert!(yaml.contains("fingerprint:"));
        assert!(yaml.contains("segment"));
    }
}
