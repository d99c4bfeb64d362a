//! Policy document and assembly
//!
//! Includes:
//! - Policy, field entries and dataset metadata
//! - Assembler with structural validation
//! - Content fingerprint for comparing runs

pub mod assembler;
pub mod document;

pub use assembler::{validate_rules, Assembly, PolicyAssembler};
pub use document::{
    ComplianceSummary, DatasetMetadata, FieldEntry, IntegrityFlags, Policy, RetentionPolicy,
};
