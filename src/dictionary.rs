//! Optional data dictionary
//!
//! Every attribute of a [`DictionaryEntry`] is optional. A missing
//! attribute means "not declared" and is never read as a negative
//! assertion; columns without an entry are simply undeclared.

use crate::classify::compliance::ComplianceFramework;
use crate::classify::role::Role;
use crate::config::PrivacyLevel;
use crate::error::{Error, Result};
use crate::profile::DType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Declared metadata for one column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryEntry {
    /// Declared coarse type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<DType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Declared lower domain bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Declared upper domain bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<PrivacyLevel>,

    /// Declared value format as a regex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_tags: Option<BTreeSet<ComplianceFramework>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DictionaryEntry {
    /// Whether the entry declares at least one domain bound
    pub fn has_bounds(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    fn validate(&self, column: &str) -> Result<()> {
        for (label, value) in [("min", self.min), ("max", self.max)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(Error::Dictionary(format!(
                    "column '{column}': {label} must be a finite number"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(Error::Dictionary(format!(
                    "column '{column}': min {min} exceeds max {max}"
                )));
            }
        }
        if let Some(format) = &self.format {
            Regex::new(format).map_err(|e| {
                Error::Dictionary(format!("column '{column}': invalid format pattern: {e}"))
            })?;
        }
        if self.allowed_values.as_ref().is_some_and(Vec::is_empty) {
            return Err(Error::Dictionary(format!(
                "column '{column}': allowed_values must not be empty"
            )));
        }
        Ok(())
    }
}

/// Wire shape of a dictionary document
#[derive(Debug, Deserialize)]
struct DictionaryDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    columns: BTreeMap<String, DictionaryEntry>,
}

/// Column name -> declared metadata, looked up case-insensitively
#[derive(Debug, Clone, Default)]
pub struct DataDictionary {
    name: Option<String>,
    entries: HashMap<String, DictionaryEntry>,
}

impl DataDictionary {
    /// Build a dictionary from `(column, entry)` pairs.
    pub fn new(
        name: Option<String>,
        columns: impl IntoIterator<Item = (String, DictionaryEntry)>,
    ) -> Result<Self> {
        let mut entries = HashMap::new();
        for (column, entry) in columns {
            entry.validate(&column)?;
            let key = column.trim().to_lowercase();
            if entries.insert(key, entry).is_some() {
                return Err(Error::Dictionary(format!(
                    "column '{column}' is declared more than once (names are case-insensitive)"
                )));
            }
        }
        Ok(Self { name, entries })
    }

    /// Parse a YAML dictionary document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let doc: DictionaryDocument = serde_yaml::from_str(content)?;
        Self::new(doc.name, doc.columns)
    }

    /// Parse a JSON dictionary document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let doc: DictionaryDocument = serde_json::from_str(content)?;
        Self::new(doc.name, doc.columns)
    }

    /// Load a dictionary file; `.yaml`/`.yml` are read as YAML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Declared metadata for a column, if any
    pub fn get(&self, column: &str) -> Option<&DictionaryEntry> {
        self.entries.get(&column.trim().to_lowercase())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared column names, lowercased, in sorted order
    pub fn columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
