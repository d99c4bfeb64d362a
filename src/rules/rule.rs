//! Validation rule data types
//!
//! A [`Rule`] is a non-empty list of [`Predicate`]s joined by a logical
//! operator, together with a justification and a relevance score.
//! Rules are constructed through [`RuleBuilder`], which rejects rules
//! without conditions.

use super::scoring::ScoreInputs;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Ge,
    Gt,
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Ge => write!(f, ">="),
            Self::Gt => write!(f, ">"),
        }
    }
}

impl Comparison {
    /// Evaluate `left <op> right`
    pub fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
        }
    }
}

/// A predicate expression over one or more columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// `column <op> value`
    Compare {
        column: String,
        op: Comparison,
        value: f64,
    },
    /// `min <= column <= max`
    Between { column: String, min: f64, max: f64 },
    /// Value is one of an enumerated set
    InSet {
        column: String,
        values: BTreeSet<String>,
    },
    NotNull { column: String },
    Unique { column: String },
    /// Timestamp is not later than the time of validation
    NotFuture { column: String },
    /// Value matches a regex
    Matches { column: String, pattern: String },
    /// `left <op> right` row by row
    CompareColumns {
        left: String,
        op: Comparison,
        right: String,
    },
    /// `when` implies `then`
    Implies {
        when: Box<Predicate>,
        then: Box<Predicate>,
    },
}

impl Predicate {
    /// Columns referenced by this predicate, in order of appearance
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Compare { column, .. }
            | Self::Between { column, .. }
            | Self::InSet { column, .. }
            | Self::NotNull { column }
            | Self::Unique { column }
            | Self::NotFuture { column }
            | Self::Matches { column, .. } => vec![column.as_str()],
            Self::CompareColumns { left, right, .. } => vec![left.as_str(), right.as_str()],
            Self::Implies { when, then } => {
                let mut columns = when.columns();
                for column in then.columns() {
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                columns
            }
        }
    }

    /// Numeric interval `[lo, hi]` admitted by a bound predicate
    pub fn interval(&self) -> Option<(f64, f64)> {
        match self {
            Self::Between { min, max, .. } => Some((*min, *max)),
            Self::Compare { op, value, .. } => Some(match op {
                Comparison::Ge | Comparison::Gt => (*value, f64::INFINITY),
                Comparison::Le | Comparison::Lt => (f64::NEG_INFINITY, *value),
            }),
            _ => None,
        }
    }
}

fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compare { column, op, value } => write!(f, "{column} {op} {}", fmt_number(*value)),
            Self::Between { column, min, max } => write!(
                f,
                "{column} BETWEEN {} AND {}",
                fmt_number(*min),
                fmt_number(*max)
            ),
            Self::InSet { column, values } => {
                let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                write!(f, "{column} IN ({})", quoted.join(", "))
            }
            Self::NotNull { column } => write!(f, "{column} IS NOT NULL"),
            Self::Unique { column } => write!(f, "{column} IS UNIQUE"),
            Self::NotFuture { column } => write!(f, "{column} <= NOW()"),
            Self::Matches { column, pattern } => write!(f, "{column} MATCHES '{pattern}'"),
            Self::CompareColumns { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::Implies { when, then } => write!(f, "IF {when} THEN {then}"),
        }
    }
}

/// Logical combinator over a rule's conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// The family a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Range,
    NonNegative,
    Membership,
    NotNull,
    Format,
    Uniqueness,
    NotFuture,
    Consistency,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Range => "range",
            Self::NonNegative => "non_negative",
            Self::Membership => "membership",
            Self::NotNull => "not_null",
            Self::Format => "format",
            Self::Uniqueness => "unique",
            Self::NotFuture => "not_future",
            Self::Consistency => "consistency",
        };
        f.write_str(name)
    }
}

impl RuleKind {
    /// Operator class used to detect equivalent rules; range and
    /// non-negative rules both bound the same value.
    pub fn operator_class(&self) -> &'static str {
        match self {
            Self::Range | Self::NonNegative => "bound",
            Self::Membership => "membership",
            Self::NotNull => "not_null",
            Self::Format => "format",
            Self::Uniqueness => "unique",
            Self::NotFuture => "not_future",
            Self::Consistency => "consistency",
        }
    }
}

/// An executable validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique within a policy
    pub rule_name: String,
    pub kind: RuleKind,
    /// Justification including statistics, bounds and their provenance
    pub description: String,
    pub operator: LogicalOperator,
    /// Non-empty, ordered
    pub conditions: Vec<Predicate>,
    /// Relevance/confidence in [0, 1]
    pub score: f64,
    pub score_basis: ScoreInputs,
    pub applies_to: BTreeSet<String>,
    /// Governance rule on a critical field; never pruned for budget
    pub pinned: bool,
}

impl Rule {
    /// Append a sentence to the justification
    pub fn add_note(&mut self, note: &str) {
        if !note.is_empty() {
            self.description.push(' ');
            self.description.push_str(note);
        }
    }

    /// Rendered conditions joined by the operator
    pub fn expression(&self) -> String {
        let joiner = match self.operator {
            LogicalOperator::And => " AND ",
            LogicalOperator::Or => " OR ",
        };
        self.conditions
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(joiner)
    }
}

/// Lowercase, underscore-separated identifier for rule names
pub fn sanitize_name(name: &str) -> String {
    let mut result = String::new();
    let mut last_was_underscore = false;
    for c in name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            result.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }
    let result = result.trim_matches('_').to_string();
    if result.is_empty() {
        "rule".to_string()
    } else {
        result
    }
}

/// Builder for constructing `Rule` instances
pub struct RuleBuilder {
    kind: RuleKind,
    name: Option<String>,
    description: Option<String>,
    notes: Vec<String>,
    operator: LogicalOperator,
    conditions: Vec<Predicate>,
    score: f64,
    score_basis: ScoreInputs,
    pinned: bool,
}

impl RuleBuilder {
    /// Create a new builder for the given rule kind
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            name: None,
            description: None,
            notes: Vec::new(),
            operator: LogicalOperator::And,
            conditions: Vec::new(),
            score: 0.0,
            score_basis: ScoreInputs::default(),
            pinned: false,
        }
    }

    /// Override the derived rule name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a sentence to the description
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn operator(mut self, operator: LogicalOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn condition(mut self, predicate: Predicate) -> Self {
        self.conditions.push(predicate);
        self
    }

    /// Set the score and the inputs it was computed from (clamped to 0.0-1.0)
    pub fn score(mut self, score: f64, basis: ScoreInputs) -> Self {
        self.score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        self.score_basis = basis;
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    /// Build the rule; fails when there are no conditions or no description
    pub fn build(self) -> Result<Rule> {
        if self.conditions.is_empty() {
            return Err(Error::InternalInvariant(format!(
                "{} rule has no conditions",
                self.kind
            )));
        }
        let mut description = self
            .description
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                Error::InternalInvariant(format!("{} rule has no description", self.kind))
            })?;
        for note in self.notes.iter().filter(|n| !n.is_empty()) {
            description.push(' ');
            description.push_str(note);
        }

        let mut ordered: Vec<&str> = Vec::new();
        for condition in &self.conditions {
            for column in condition.columns() {
                if !ordered.contains(&column) {
                    ordered.push(column);
                }
            }
        }
        let name = match self.name {
            Some(name) => sanitize_name(&name),
            None => sanitize_name(&format!("{}_{}", self.kind, ordered.join("_"))),
        };
        let applies_to = ordered.iter().map(|c| c.to_string()).collect();

        Ok(Rule {
            rule_name: name,
            kind: self.kind,
            description,
            operator: self.operator,
            conditions: self.conditions,
            score: self.score,
            score_basis: self.score_basis,
            applies_to,
            pinned: self.pinned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn between(column: &str, min: f64, max: f64) -> Predicate {
        Predicate::Between {
            column: column.to_string(),
            min,
            max,
        }
    }

    #[test]
    fn test_rule_builder() {
        let rule = RuleBuilder::new(RuleKind::Range)
            .condition(between("Customer Age", 0.0, 120.0))
            .description("Age within canonical bounds.")
            .note("Observed range [18, 65].")
            .score(0.8, ScoreInputs::default())
            .build()
            .unwrap();

        assert_eq!(rule.rule_name, "range_customer_age");
        assert_eq!(rule.operator, LogicalOperator::And);
        assert_eq!(
            rule.applies_to,
            BTreeSet::from(["Customer Age".to_string()])
        );
        assert_eq!(
            rule.description,
            "Age within canonical bounds. Observed range [18, 65]."
        );
        assert!(!rule.pinned);
    }

    #[test]
    fn test_rule_builder_requires_conditions() {
        let result = RuleBuilder::new(RuleKind::NotNull)
            .description("nothing to check")
            .build();
        assert!(matches!(result, Err(Error::InternalInvariant(_))));
    }

    #[test]
    fn test_score_is_clamped() {
        let rule = RuleBuilder::new(RuleKind::NotNull)
            .condition(Predicate::NotNull {
                column: "email".into(),
            })
            .description("Email must be present.")
            .score(1.7, ScoreInputs::default())
            .build()
            .unwrap();
        assert_eq!(rule.score, 1.0);
    }

    #[test]
    fn test_predicate_display() {
        assert_eq!(between("age", 0.0, 120.0).to_string(), "age BETWEEN 0 AND 120");
        let set = Predicate::InSet {
            column: "tier".into(),
            values: BTreeSet::from(["gold".to_string(), "basic".to_string()]),
        };
        assert_eq!(set.to_string(), "tier IN ('basic', 'gold')");
        let implies = Predicate::Implies {
            when: Box::new(Predicate::Compare {
                column: "age".into(),
                op: Comparison::Lt,
                value: 18.0,
            }),
            then: Box::new(Predicate::Compare {
                column: "income".into(),
                op: Comparison::Le,
                value: 0.0,
            }),
        };
        assert_eq!(implies.to_string(), "IF age < 18 THEN income <= 0");
        assert_eq!(implies.columns(), vec!["age", "income"]);
    }

    #[test]
    fn test_interval() {
        let ge = Predicate::Compare {
            column: "income".into(),
            op: Comparison::Ge,
            value: 0.0,
        };
        assert_eq!(ge.interval(), Some((0.0, f64::INFINITY)));
        assert_eq!(between("a", 1.0, 2.0).interval(), Some((1.0, 2.0)));
        assert_eq!(Predicate::NotNull { column: "a".into() }.interval(), None);
    }

    #[test]
    fn test_predicate_serialization() {
        let json = serde_json::to_value(between("age", 0.0, 120.0)).unwrap();
        assert_eq!(json["kind"], "between");
        assert_eq!(json["column"], "age");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Range: Age / Income "), "range_age_income");
        assert_eq!(sanitize_name("___"), "rule");
    }

    #[test]
    fn test_operator_class() {
        assert_eq!(
            RuleKind::Range.operator_class(),
            RuleKind::NonNegative.operator_class()
        );
        assert_ne!(
            RuleKind::NotNull.operator_class(),
            RuleKind::Membership.operator_class()
        );
    }
}
