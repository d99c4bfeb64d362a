//! Per-column classification combining role and sensitivity

use super::role::{Role, RoleAssignment, RoleClassifier};
use super::sensitivity::{SensitivityAssignment, SensitivityClassifier};
use crate::config::{EngineConfig, PrivacyLevel};
use crate::dictionary::DictionaryEntry;
use crate::error::Result;
use crate::profile::{ColumnSample, ColumnStatistics};

/// Classification of one column
#[derive(Debug, Clone, PartialEq)]
pub struct FieldClassification {
    pub name: String,
    pub role: RoleAssignment,
    pub sensitivity: SensitivityAssignment,
}

impl FieldClassification {
    pub fn is_identifier(&self) -> bool {
        self.role.role.value == Role::Identifier
    }

    pub fn is_critical(&self) -> bool {
        self.sensitivity.critical_field.value
    }

    pub fn privacy_level(&self) -> PrivacyLevel {
        self.sensitivity.privacy_level.value
    }
}

/// Runs the role classifier, then the sensitivity classifier
pub struct FieldClassifier<'a> {
    roles: RoleClassifier<'a>,
    sensitivity: SensitivityClassifier<'a>,
}

impl<'a> FieldClassifier<'a> {
    pub fn new(config: &'a EngineConfig) -> Result<Self> {
        Ok(Self {
            roles: RoleClassifier::new(config),
            sensitivity: SensitivityClassifier::new(config)?,
        })
    }

    pub fn classify(
        &self,
        column: &ColumnSample,
        stats: &ColumnStatistics,
        entry: Option<&DictionaryEntry>,
    ) -> FieldClassification {
        let role = self.roles.classify(stats, entry);
        let sensitivity = self.sensitivity.classify(column, stats, &role, entry);
        FieldClassification {
            name: stats.name.clone(),
            role,
            sensitivity,
        }
    }
}
