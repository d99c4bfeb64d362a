//! In-memory tabular sample
//!
//! A [`Dataset`] is an ordered set of [`ColumnSample`]s of equal length.
//! It is validated once at construction and immutable afterwards; every
//! downstream stage borrows it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Text tokens treated as missing values in dirty samples.
const NULL_TOKENS: &[&str] = &["", "null", "none", "na", "n/a", "nan", "nil", "-"];

/// A single raw scalar as observed in the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Missing value
    Null,
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// Anything else, kept verbatim
    Text(String),
}

impl RawValue {
    /// Whether this value counts as missing (explicit null or a null token).
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(f) => f.is_nan(),
            Self::Text(s) => {
                let trimmed = s.trim();
                NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
            }
            Self::Bool(_) | Self::Int(_) => false,
        }
    }

    /// Numeric interpretation, if the value is (or parses as) a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) if f.is_finite() => Some(*f),
            Self::Text(s) => s
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Boolean interpretation for literal booleans and common boolean tokens.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "t" => Some(true),
                "false" | "no" | "n" | "f" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical text rendering used for categories and pattern matching.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Raw observed values for one column, in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSample {
    /// Column name as declared in the source
    pub name: String,
    /// Observed values (nulls permitted)
    pub values: Vec<RawValue>,
}

impl ColumnSample {
    /// Create a column from anything convertible into raw values
    pub fn new<V: Into<RawValue>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of rows in this column
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Wire shape accepted by serde before validation.
#[derive(Debug, Deserialize)]
struct DatasetDocument {
    #[serde(default)]
    population_total: Option<usize>,
    columns: Vec<ColumnSample>,
}

/// A validated, immutable tabular sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DatasetDocument")]
pub struct Dataset {
    columns: Vec<ColumnSample>,
    population_total: Option<usize>,
}

impl TryFrom<DatasetDocument> for Dataset {
    type Error = Error;

    fn try_from(doc: DatasetDocument) -> Result<Self> {
        let dataset = Self::new(doc.columns)?;
        Ok(match doc.population_total {
            Some(total) => dataset.with_population_total(total),
            None => dataset,
        })
    }
}

impl Dataset {
    /// Validate and wrap a set of columns.
    ///
    /// Fails with [`Error::Input`] when the dataset has no columns, any
    /// column has zero rows, column lengths differ, or names repeat.
    pub fn new(columns: Vec<ColumnSample>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Input("dataset has no columns".to_string()));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if column.name.trim().is_empty() {
                return Err(Error::Input("column with an empty name".to_string()));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::Input(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
            if column.is_empty() {
                return Err(Error::Input(format!(
                    "column '{}' has zero rows",
                    column.name
                )));
            }
        }

        let rows = columns[0].len();
        if let Some(ragged) = columns.iter().find(|c| c.len() != rows) {
            return Err(Error::Input(format!(
                "column '{}' has {} rows, expected {}",
                ragged.name,
                ragged.len(),
                rows
            )));
        }

        Ok(Self {
            columns,
            population_total: None,
        })
    }

    /// Record the size of the population this sample was drawn from
    pub fn with_population_total(mut self, total: usize) -> Self {
        self.population_total = Some(total);
        self
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[ColumnSample] {
        &self.columns
    }

    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&ColumnSample> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Declaration index of a column
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Number of sampled rows
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, ColumnSample::len)
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Declared population size, if known
    pub fn population_total(&self) -> Option<usize> {
        self.population_total
    }
}
