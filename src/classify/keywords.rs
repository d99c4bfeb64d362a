//! Keyword lookup tables
//!
//! Column names are split into lowercase tokens (`customerID` and
//! `customer_id` both become `["customer", "id"]`) and matched against
//! versioned tables. The built-in tables are plain constants; a
//! configuration file may replace them wholesale, but nothing mutates
//! them at runtime.

use super::compliance::ComplianceFramework;
use serde::{Deserialize, Serialize};

/// Version of the built-in tables
pub const TABLES_VERSION: &str = "2024.1";

const IDENTIFIER_TOKENS: &[&str] = &["id", "uuid", "guid", "key", "identifier"];

const WEAK_IDENTIFIER_TOKENS: &[&str] = &["code", "number", "ref", "reference", "no"];

const DATE_TOKENS: &[&str] = &[
    "date", "time", "timestamp", "datetime", "dt", "created", "updated", "modified", "dob", "birth",
    "birthday", "start", "end", "at",
];

const FACT_TOKENS: &[&str] = &[
    "amount", "price", "cost", "income", "salary", "wage", "revenue", "balance", "total", "age",
    "score", "rate", "weight", "height", "quantity", "qty", "count", "duration", "value",
];

const DIMENSION_TOKENS: &[&str] = &[
    "type", "category", "status", "gender", "sex", "country", "region", "city", "state", "segment",
    "group", "class", "level", "department", "name", "label", "tier", "channel",
];

const HIGH_PRIVACY_TOKENS: &[&str] = &[
    "first_name", "last_name", "full_name", "surname", "name", "email", "mail", "phone", "mobile", "address",
    "street", "ssn", "passport", "license", "dob", "birth", "birthdate", "iban", "card", "cvv",
    "account", "diagnosis", "treatment", "health", "insurance", "patient", "medical", "ip",
];

const MEDIUM_PRIVACY_TOKENS: &[&str] = &[
    "age", "gender", "sex", "income", "salary", "wage", "zip", "zipcode", "postcode", "postal",
    "city", "location", "nationality", "ethnicity", "religion", "latitude", "lat", "longitude",
    "lon", "lng",
];

const LOW_PRIVACY_TOKENS: &[&str] = &[
    "category", "description", "type", "status", "count", "quantity", "qty", "price", "product",
    "created", "updated", "flag", "label", "tier",
];

const PUBLIC_TOKENS: &[&str] = &["description", "category"];

const GDPR_TOKENS: &[&str] = &[
    "name", "email", "mail", "address", "location", "phone", "mobile", "ip", "birth", "dob",
    "passport", "id", "nationality", "ethnicity", "religion", "gender",
];

const HIPAA_TOKENS: &[&str] = &[
    "ssn", "diagnosis", "treatment", "health", "insurance", "patient", "medical", "prescription",
];

const PCI_DSS_TOKENS: &[&str] = &["card", "cvv", "cvc", "pan", "expiry", "cardholder"];

/// (domain, tokens, canonical min, canonical max)
const DOMAINS: &[(&str, &[&str], Option<f64>, Option<f64>)] = &[
    ("age", &["age"], Some(0.0), Some(120.0)),
    ("percentage", &["percent", "percentage", "pct"], Some(0.0), Some(100.0)),
    ("income", &["income", "salary", "wage", "earnings"], Some(0.0), None),
    ("price", &["price", "cost", "amount", "fee"], Some(0.0), None),
    ("year", &["year", "yr"], Some(1900.0), Some(2100.0)),
    ("latitude", &["latitude", "lat"], Some(-90.0), Some(90.0)),
    ("longitude", &["longitude", "lon", "lng"], Some(-180.0), Some(180.0)),
    ("count", &["count", "quantity", "qty"], Some(0.0), None),
];

/// A recognized value domain with canonical bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEntry {
    pub name: String,
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Name tokens that mark regulated data for one framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkTokens {
    pub framework: ComplianceFramework,
    pub tokens: Vec<String>,
}

/// Keyword-to-role, keyword-to-domain and privacy lookup tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTables {
    pub version: String,
    pub identifier: Vec<String>,
    /// Tokens that mean "identifier" only when values are near-unique
    pub weak_identifier: Vec<String>,
    pub date: Vec<String>,
    pub fact: Vec<String>,
    pub dimension: Vec<String>,
    pub high_privacy: Vec<String>,
    pub medium_privacy: Vec<String>,
    pub low_privacy: Vec<String>,
    /// Descriptive fields published with `public` transparency
    pub public: Vec<String>,
    pub domains: Vec<DomainEntry>,
    pub compliance: Vec<FrameworkTokens>,
}

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            version: TABLES_VERSION.to_string(),
            identifier: owned(IDENTIFIER_TOKENS),
            weak_identifier: owned(WEAK_IDENTIFIER_TOKENS),
            date: owned(DATE_TOKENS),
            fact: owned(FACT_TOKENS),
            dimension: owned(DIMENSION_TOKENS),
            high_privacy: owned(HIGH_PRIVACY_TOKENS),
            medium_privacy: owned(MEDIUM_PRIVACY_TOKENS),
            low_privacy: owned(LOW_PRIVACY_TOKENS),
            public: owned(PUBLIC_TOKENS),
            domains: DOMAINS
                .iter()
                .map(|(name, tokens, min, max)| DomainEntry {
                    name: name.to_string(),
                    tokens: owned(tokens),
                    min: *min,
                    max: *max,
                })
                .collect(),
            compliance: vec![
                FrameworkTokens {
                    framework: ComplianceFramework::Gdpr,
                    tokens: owned(GDPR_TOKENS),
                },
                FrameworkTokens {
                    framework: ComplianceFramework::Hipaa,
                    tokens: owned(HIPAA_TOKENS),
                },
                FrameworkTokens {
                    framework: ComplianceFramework::PciDss,
                    tokens: owned(PCI_DSS_TOKENS),
                },
            ],
        }
    }
}

impl KeywordTables {
    /// First entry of `table` found in the tokenized name
    pub fn first_match<'t>(&self, name_tokens: &[String], table: &'t [String]) -> Option<&'t str> {
        table
            .iter()
            .find(|entry| contains_entry(name_tokens, entry))
            .map(String::as_str)
    }

    /// Whether any entry of `table` occurs in the tokenized name
    pub fn matches(&self, name_tokens: &[String], table: &[String]) -> bool {
        self.first_match(name_tokens, table).is_some()
    }

    /// First recognized domain for the tokenized name, in table order
    pub fn domain_for(&self, name_tokens: &[String]) -> Option<&DomainEntry> {
        self.domains
            .iter()
            .find(|domain| domain.tokens.iter().any(|t| contains_entry(name_tokens, t)))
    }

    /// Frameworks whose tokens occur in the tokenized name
    pub fn frameworks_for(&self, name_tokens: &[String]) -> Vec<ComplianceFramework> {
        self.compliance
            .iter()
            .filter(|ft| ft.tokens.iter().any(|t| contains_entry(name_tokens, t)))
            .map(|ft| ft.framework)
            .collect()
    }
}

/// Split a column name into lowercase tokens on separators, camelCase
/// humps and letter/digit transitions.
pub fn tokenize(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p)) {
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_alphanumeric()
                && ((prev.is_lowercase() && c.is_uppercase())
                    || (prev.is_uppercase() && c.is_uppercase() && next_lower)
                    || (prev.is_ascii_digit() != c.is_ascii_digit()));
            if boundary && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Whether a (possibly multi-token) entry occurs as a contiguous run of
/// name tokens. `first_name` matches both `first_name` and `firstname`.
fn contains_entry(name_tokens: &[String], entry: &str) -> bool {
    let compact: String = tokenize(entry).concat();
    if compact.is_empty() {
        return false;
    }
    (0..name_tokens.len()).any(|start| {
        let mut joined = String::new();
        for token in &name_tokens[start..] {
            joined.push_str(token);
            if joined == compact {
                return true;
            }
            if joined.len() >= compact.len() {
                break;
            }
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("customer_id"), vec!["customer", "id"]);
        assert_eq!(tokenize("customerID"), vec!["customer", "id"]);
        assert_eq!(tokenize("HTTPServer"), vec!["http", "server"]);
        assert_eq!(tokenize("DOB"), vec!["dob"]);
        assert_eq!(tokenize("address2 line"), vec!["address", "2", "line"]);
        assert_eq!(tokenize("Date-Of-Birth"), vec!["date", "of", "birth"]);
        assert!(tokenize("__").is_empty());
    }

    #[test]
    fn test_token_matching_is_not_substring() {
        let tables = KeywordTables::default();
        assert!(tables.matches(&tokenize("age"), &tables.fact));
        assert!(!tables.matches(&tokenize("page_views"), &tables.fact));
        assert!(!tables.matches(&tokenize("usage"), &tables.fact));
    }

    #[test]
    fn test_compound_entries() {
        let tables = KeywordTables::default();
        assert_eq!(
            tables.first_match(&tokenize("FirstName"), &tables.high_privacy),
            Some("first_name")
        );
        assert_eq!(
            tables.first_match(&tokenize("customer_first_name"), &tables.high_privacy),
            Some("first_name")
        );
    }

    #[test]
    fn test_domain_lookup() {
        let tables = KeywordTables::default();
        let age = tables.domain_for(&tokenize("customer_age")).unwrap();
        assert_eq!(age.name, "age");
        assert_eq!((age.min, age.max), (Some(0.0), Some(120.0)));
        let income = tables.domain_for(&tokenize("AnnualSalary")).unwrap();
        assert_eq!(income.name, "income");
        assert_eq!(income.max, None);
        assert!(tables.domain_for(&tokenize("zorblax")).is_none());
    }

    #[test]
    fn test_frameworks_for() {
        let tables = KeywordTables::default();
        assert_eq!(
            tables.frameworks_for(&tokenize("patient_email")),
            vec![ComplianceFramework::Gdpr, ComplianceFramework::Hipaa]
        );
        assert!(tables.frameworks_for(&tokenize("colour")).is_empty());
    }

    #[test]
    fn test_tables_roundtrip_through_toml() {
        let tables = KeywordTables::default();
        let text = toml::to_string(&tables).unwrap();
        let parsed: KeywordTables = toml::from_str(&text).unwrap();
        assert_eq!(parsed, tables);
    }
}
