//! Compliance frameworks and value patterns for regulated data.
//!
//! Column names are mapped to frameworks through the keyword tables;
//! this module carries the framework identifiers, the content patterns
//! that recognize regulated values (email addresses, payment cards, ...)
//! and the dataset-level risk assessment.

use crate::config::PrivacyLevel;
use serde::{Deserialize, Serialize};

/// Compliance framework identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceFramework {
    /// GDPR: EU personal data
    Gdpr,
    /// HIPAA: Protected Health Information
    Hipaa,
    /// PCI-DSS: Payment card data
    PciDss,
}

impl std::fmt::Display for ComplianceFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gdpr => write!(f, "GDPR"),
            Self::Hipaa => write!(f, "HIPAA"),
            Self::PciDss => write!(f, "PCI-DSS"),
        }
    }
}

/// A regex recognizing one kind of regulated value
#[derive(Debug, Clone)]
pub struct ContentPattern {
    /// Pattern name
    pub name: &'static str,
    /// Whole-value regex
    pub pattern: &'static str,
    /// Regex finding the value inside free text, where that is reliable
    pub embedded: Option<&'static str>,
    /// Frameworks the value falls under
    pub frameworks: &'static [ComplianceFramework],
    /// Whether the regex is strict enough to be emitted as a format rule
    pub enforceable: bool,
}

/// Built-in content patterns, checked in order
pub fn content_patterns() -> Vec<ContentPattern> {
    vec![
        ContentPattern {
            name: "email",
            pattern: r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$",
            embedded: Some(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
            frameworks: &[ComplianceFramework::Gdpr],
            enforceable: true,
        },
        ContentPattern {
            name: "ssn",
            pattern: r"^\d{3}-\d{2}-\d{4}$",
            embedded: Some(r"\b\d{3}-\d{2}-\d{4}\b"),
            frameworks: &[ComplianceFramework::Gdpr, ComplianceFramework::Hipaa],
            enforceable: true,
        },
        ContentPattern {
            name: "credit_card",
            pattern: r"^(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2})[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{3,4}$",
            embedded: Some(r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2})[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{3,4}\b"),
            frameworks: &[ComplianceFramework::PciDss],
            enforceable: false,
        },
        ContentPattern {
            name: "ipv4",
            pattern: r"^(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)$",
            embedded: None,
            frameworks: &[ComplianceFramework::Gdpr],
            enforceable: true,
        },
        ContentPattern {
            name: "phone",
            pattern: r"^\+?\(?\d{1,4}\)?[-\s.]?\d{2,4}[-\s.]?\d{3,4}[-\s.]?\d{0,4}$",
            embedded: None,
            frameworks: &[ComplianceFramework::Gdpr],
            enforceable: false,
        },
    ]
}

/// Dataset-level compliance risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Risk from the privacy levels of all fields: two or more high-privacy
/// fields is high risk, two or more fields at medium or above is medium.
pub fn assess_risk(levels: impl IntoIterator<Item = PrivacyLevel>) -> RiskLevel {
    let (mut high, mut medium) = (0usize, 0usize);
    for level in levels {
        match level {
            PrivacyLevel::High => high += 1,
            PrivacyLevel::Medium => medium += 1,
            PrivacyLevel::Low => {}
        }
    }
    if high >= 2 {
        RiskLevel::High
    } else if high + medium >= 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
