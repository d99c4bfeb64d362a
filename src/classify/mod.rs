//! Field classification
//!
//! Assigns each column a semantic role and a sensitivity posture, with
//! the provenance of every decision recorded. Includes:
//! - Keyword/domain lookup tables
//! - Role classification (fact, dimension, identifier)
//! - Sensitivity classification (privacy level, criticality, access)
//! - Compliance frameworks (GDPR, HIPAA, PCI-DSS)

pub mod compliance;
pub mod field;
pub mod keywords;
pub mod provenance;
pub mod role;
pub mod sensitivity;

pub use compliance::{assess_risk, ComplianceFramework, RiskLevel};
pub use field::{FieldClassification, FieldClassifier};
pub use keywords::{tokenize, DomainEntry, KeywordTables};
pub use provenance::{Source, Sourced};
pub use role::{Role, RoleAssignment, RoleClassifier};
pub use sensitivity::{
    AccessRestriction, ContentMatch, SecurityPosture, SensitivityAssignment,
    SensitivityClassifier, Transparency,
};
