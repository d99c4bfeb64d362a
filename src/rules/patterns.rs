//! Cross-column consistency patterns
//!
//! A pattern recognizes a group of columns by role, domain and name, then
//! proposes a consistency rule for that group. Every proposal is checked
//! row by row against the sample: a rule the sample contradicts beyond the
//! configured tolerance is dropped, and tolerated violations lower its
//! confidence. New patterns are added by implementing
//! [`ConsistencyPattern`] and registering them; the synthesis loop never
//! changes.

use super::rule::{Comparison, Predicate, Rule, RuleBuilder, RuleKind};
use super::scoring::{self, ScoreInputs};
use super::synthesizer::fmt_value;
use super::ColumnContext;
use crate::classify::{tokenize, Source};
use crate::config::{EngineConfig, ScoringConfig, ThresholdConfig};
use crate::profile::profiler::parse_timestamp;
use crate::profile::RawValue;

/// Start/end token pairs that imply ordering between two dated columns
const ORDERED_TOKEN_PAIRS: &[(&str, &str)] = &[
    ("start", "end"),
    ("begin", "end"),
    ("from", "to"),
    ("created", "updated"),
    ("created", "modified"),
    ("opened", "closed"),
    ("checkin", "checkout"),
];

const BIRTH_TOKENS: &[&str] = &["birth", "dob", "birthdate", "birthday"];

/// Shared settings handed to patterns
pub struct PatternEnv<'a> {
    pub thresholds: &'a ThresholdConfig,
    pub scoring: &'a ScoringConfig,
}

/// A recognizable multi-column relationship
pub trait ConsistencyPattern: Send + Sync {
    /// Pattern name used in rule names and logs
    fn name(&self) -> &'static str;

    /// Column groups this pattern applies to, as indices into `columns`
    fn applicable(&self, columns: &[ColumnContext<'_>]) -> Vec<Vec<usize>>;

    /// Build the rule for one group, or `None` when the sample does not
    /// support it
    fn build(&self, group: &[ColumnContext<'_>], env: &PatternEnv<'_>) -> Option<Rule>;
}

/// Ordered set of consistency patterns
pub struct PatternRegistry {
    patterns: Vec<Box<dyn ConsistencyPattern>>,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }
}

impl PatternRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn register(&mut self, pattern: Box<dyn ConsistencyPattern>) {
        self.patterns.push(pattern);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|p| p.name()).collect()
    }

    /// Run every pattern over every applicable group
    pub fn synthesize(&self, columns: &[ColumnContext<'_>], config: &EngineConfig) -> Vec<Rule> {
        let env = PatternEnv {
            thresholds: &config.thresholds,
            scoring: &config.scoring,
        };
        let mut rules = Vec::new();
        for pattern in &self.patterns {
            for group in pattern.applicable(columns) {
                let contexts: Vec<ColumnContext<'_>> =
                    group.iter().filter_map(|&i| columns.get(i).copied()).collect();
                if contexts.len() != group.len() {
                    continue;
                }
                match pattern.build(&contexts, &env) {
                    Some(rule) => {
                        tracing::debug!(pattern = pattern.name(), rule = %rule.rule_name, "Consistency rule proposed");
                        rules.push(rule);
                    }
                    None => {
                        let names: Vec<&str> = contexts.iter().map(|c| c.name()).collect();
                        tracing::debug!(pattern = pattern.name(), columns = ?names, "Consistency pattern not supported by sample");
                    }
                }
            }
        }
        rules
    }
}

/// Built-in patterns: minor income, date ordering, birth before event
pub fn default_patterns() -> Vec<Box<dyn ConsistencyPattern>> {
    vec![
        Box::new(MinorIncome),
        Box::new(DateOrder),
        Box::new(BirthBeforeEvent),
    ]
}

/// Row-level support for a proposed relationship
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RowEvidence {
    evaluated: usize,
    violations: usize,
}

impl RowEvidence {
    fn violation_rate(&self) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.violations as f64 / self.evaluated as f64
        }
    }
}

/// Evaluate `check` on every row where both values are present
fn check_rows(
    left: &ColumnContext<'_>,
    right: &ColumnContext<'_>,
    check: impl Fn(&RawValue, &RawValue) -> Option<bool>,
) -> RowEvidence {
    let mut evidence = RowEvidence::default();
    for (l, r) in left.sample.values.iter().zip(&right.sample.values) {
        if l.is_null() || r.is_null() {
            continue;
        }
        if let Some(holds) = check(l, r) {
            evidence.evaluated += 1;
            if !holds {
                evidence.violations += 1;
            }
        }
    }
    evidence
}

/// Orderable value: a number, or seconds since the epoch for timestamps
fn ordinal(value: &RawValue) -> Option<f64> {
    value.as_f64().or_else(|| {
        parse_timestamp(&value.render()).map(|(parsed, _, _)| parsed.and_utc().timestamp() as f64)
    })
}

/// Shared acceptance step: drop contradicted rules, penalize tolerated ones
fn finish(
    builder: RuleBuilder,
    group: &[ColumnContext<'_>],
    evidence: RowEvidence,
    env: &PatternEnv<'_>,
) -> Option<Rule> {
    if evidence.evaluated == 0 {
        return None;
    }
    let rate = evidence.violation_rate();
    if rate > env.thresholds.consistency_violation_tolerance {
        return None;
    }

    let criticality = group
        .iter()
        .map(|c| scoring::criticality(&c.field.sensitivity))
        .fold(0.0, f64::max);
    let confidence = group
        .iter()
        .map(|c| scoring::confidence(c.stats, env.scoring))
        .fold(1.0, f64::min);
    let basis = ScoreInputs::new(criticality, confidence, 0.85).penalize(1.0 - rate);

    let mut builder = builder
        .note(format!(
            "Checked against {} rows; {} contradicted it.",
            evidence.evaluated, evidence.violations
        ))
        .score(scoring::score(basis, env.scoring), basis);
    if evidence.violations > 0 {
        builder = builder.note(format!(
            "The violation rate {:.1}% is within tolerance, so confidence was reduced accordingly.",
            rate * 100.0
        ));
    }
    builder.build().ok()
}

fn is_temporal(ctx: &ColumnContext<'_>) -> bool {
    ctx.field.role.temporal.value
}

fn is_birth_column(ctx: &ColumnContext<'_>) -> bool {
    tokenize(ctx.name())
        .iter()
        .any(|t| BIRTH_TOKENS.contains(&t.as_str()))
}

/// Minors are expected to have no income; adults a non-negative one
pub struct MinorIncome;

impl ConsistencyPattern for MinorIncome {
    fn name(&self) -> &'static str {
        "minor_income"
    }

    fn applicable(&self, columns: &[ColumnContext<'_>]) -> Vec<Vec<usize>> {
        let in_domain = |name: &str| {
            columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.field.role.domain.as_ref().is_some_and(|d| d.name == name))
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        };
        let ages = in_domain("age");
        let incomes = in_domain("income");
        ages.iter()
            .flat_map(|&a| incomes.iter().filter(move |&&i| i != a).map(move |&i| vec![a, i]))
            .collect()
    }

    fn build(&self, group: &[ColumnContext<'_>], env: &PatternEnv<'_>) -> Option<Rule> {
        let [age, income] = group else {
            return None;
        };
        let adult = env.thresholds.adult_age;
        let ceiling = env.thresholds.minor_income_ceiling;

        let evidence = check_rows(age, income, |a, i| {
            let (a, i) = (a.as_f64()?, i.as_f64()?);
            Some(if a < adult { i <= ceiling } else { i >= 0.0 })
        });
        let minors_seen = age
            .sample
            .values
            .iter()
            .filter_map(RawValue::as_f64)
            .any(|a| a < adult);

        let compare = |column: &str, op, value| {
            Box::new(Predicate::Compare {
                column: column.to_string(),
                op,
                value,
            })
        };
        let mut builder = RuleBuilder::new(RuleKind::Consistency)
            .name(format!("consistency_{}_{}_{}", self.name(), age.name(), income.name()))
            .condition(Predicate::Implies {
                when: compare(age.name(), Comparison::Lt, adult),
                then: compare(income.name(), Comparison::Le, ceiling),
            })
            .condition(Predicate::Implies {
                when: compare(age.name(), Comparison::Ge, adult),
                then: compare(income.name(), Comparison::Ge, 0.0),
            })
            .description(format!(
                "'{income}' must be consistent with '{age}': rows with {age} < {adult} must have {income} <= {ceiling}, and rows with {age} >= {adult} must have {income} >= 0 (source: {source}).",
                income = income.name(),
                age = age.name(),
                adult = fmt_value(adult),
                ceiling = fmt_value(ceiling),
                source = Source::NameHeuristic,
            ));
        if !minors_seen {
            builder = builder.note(format!(
                "No rows with {} < {} were observed; that branch rests on convention.",
                age.name(),
                fmt_value(adult)
            ));
        }
        finish(builder, group, evidence, env)
    }
}

/// Start/end style column pairs must be ordered
pub struct DateOrder;

impl DateOrder {
    /// Tokens left once the ordering token is removed
    fn stem(tokens: &[String], marker: &str) -> Option<Vec<String>> {
        let position = tokens.iter().position(|t| t == marker)?;
        let mut stem = tokens.to_vec();
        stem.remove(position);
        Some(stem)
    }
}

impl ConsistencyPattern for DateOrder {
    fn name(&self) -> &'static str {
        "date_order"
    }

    fn applicable(&self, columns: &[ColumnContext<'_>]) -> Vec<Vec<usize>> {
        let dated: Vec<(usize, Vec<String>)> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| is_temporal(c))
            .map(|(i, c)| (i, tokenize(c.name())))
            .collect();

        let mut groups = Vec::new();
        for (first, first_tokens) in &dated {
            for (second, second_tokens) in &dated {
                if first == second {
                    continue;
                }
                let ordered = ORDERED_TOKEN_PAIRS.iter().any(|(early, late)| {
                    match (Self::stem(first_tokens, early), Self::stem(second_tokens, late)) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    }
                });
                let group = vec![*first, *second];
                if ordered && !groups.contains(&group) {
                    groups.push(group);
                }
            }
        }
        groups
    }

    fn build(&self, group: &[ColumnContext<'_>], env: &PatternEnv<'_>) -> Option<Rule> {
        let [early, late] = group else {
            return None;
        };
        let evidence = check_rows(early, late, |a, b| Some(ordinal(a)? <= ordinal(b)?));
        let builder = RuleBuilder::new(RuleKind::Consistency)
            .name(format!("consistency_{}_{}_{}", self.name(), early.name(), late.name()))
            .condition(Predicate::CompareColumns {
                left: early.name().to_string(),
                op: Comparison::Le,
                right: late.name().to_string(),
            })
            .description(format!(
                "'{}' must not be later than '{}' in the same row (source: {}).",
                early.name(),
                late.name(),
                Source::NameHeuristic
            ));
        finish(builder, group, evidence, env)
    }
}

/// A birth date precedes every other date recorded about the same subject
pub struct BirthBeforeEvent;

impl ConsistencyPattern for BirthBeforeEvent {
    fn name(&self) -> &'static str {
        "birth_before_event"
    }

    fn applicable(&self, columns: &[ColumnContext<'_>]) -> Vec<Vec<usize>> {
        let mut groups = Vec::new();
        for (birth, b) in columns.iter().enumerate() {
            if !is_temporal(b) || !is_birth_column(b) {
                continue;
            }
            for (event, e) in columns.iter().enumerate() {
                if event != birth && is_temporal(e) && !is_birth_column(e) {
                    groups.push(vec![birth, event]);
                }
            }
        }
        groups
    }

    fn build(&self, group: &[ColumnContext<'_>], env: &PatternEnv<'_>) -> Option<Rule> {
        let [birth, event] = group else {
            return None;
        };
        let evidence = check_rows(birth, event, |a, b| Some(ordinal(a)? <= ordinal(b)?));
        let builder = RuleBuilder::new(RuleKind::Consistency)
            .name(format!("consistency_{}_{}_{}", self.name(), birth.name(), event.name()))
            .condition(Predicate::CompareColumns {
                left: birth.name().to_string(),
                op: Comparison::Le,
                right: event.name().to_string(),
            })
            .description(format!(
                "'{}' must precede '{}': a subject cannot take part in an event before birth (source: {}).",
                birth.name(),
                event.name(),
                Source::NameHeuristic
            ));
        finish(builder, group, evidence, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{FieldClassification, FieldClassifier};
    use crate::rules::rule::LogicalOperator;
    use crate::profile::{ColumnSample, ColumnStatistics, Profiler};

    struct Analysis {
        columns: Vec<ColumnSample>,
        stats: Vec<ColumnStatistics>,
        fields: Vec<FieldClassification>,
    }

    impl Analysis {
        fn new(columns: Vec<ColumnSample>) -> Self {
            let config = EngineConfig::default();
            let profiler = Profiler::new(&config);
            let classifier = FieldClassifier::new(&config).unwrap();
            let stats: Vec<_> = columns.iter().map(|c| profiler.profile(c)).collect();
            let fields = columns
                .iter()
                .zip(&stats)
                .map(|(c, s)| classifier.classify(c, s, None))
                .collect();
            Self {
                columns,
                stats,
                fields,
            }
        }

        fn contexts(&self) -> Vec<ColumnContext<'_>> {
            (0..self.columns.len())
                .map(|index| ColumnContext {
                    sample: &self.columns[index],
                    stats: &self.stats[index],
                    field: &self.fields[index],
                    entry: None,
                })
                .collect()
        }
    }

    fn synthesize(columns: Vec<ColumnSample>) -> Vec<Rule> {
        let config = EngineConfig::default();
        let analysis = Analysis::new(columns);
        PatternRegistry::default().synthesize(&analysis.contexts(), &config)
    }

    fn ages_and_incomes(n: i64) -> (Vec<i64>, Vec<i64>) {
        let ages: Vec<i64> = (0..n).map(|i| 5 + (i * 7) % 70).collect();
        let incomes = ages
            .iter()
            .enumerate()
            .map(|(i, &a)| if a < 18 { 0 } else { 20_000 + (i as i64) * 500 })
            .collect();
        (ages, incomes)
    }

    #[test]
    fn test_default_registry() {
        assert_eq!(
            PatternRegistry::default().names(),
            vec!["minor_income", "date_order", "birth_before_event"]
        );
        assert!(PatternRegistry::new().names().is_empty());
    }

    #[test]
    fn test_minor_income_rule() {
        let (ages, incomes) = ages_and_incomes(60);
        let rules = synthesize(vec![
            ColumnSample::new("age", ages),
            ColumnSample::new("income", incomes),
        ]);
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.kind, RuleKind::Consistency);
        assert_eq!(rule.conditions.len(), 2);
        assert_eq!(rule.conditions[0].to_string(), "IF age < 18 THEN income <= 0");
        assert_eq!(rule.conditions[1].to_string(), "IF age >= 18 THEN income >= 0");
        assert!(rule.description.contains("0 contradicted it"));
    }

    #[test]
    fn test_contradicted_pattern_is_dropped() {
        let ages: Vec<i64> = (0..60).map(|i| 5 + (i * 7) % 70).collect();
        let incomes: Vec<i64> = (0..60).map(|i| 10_000 + i * 100).collect();
        let rules = synthesize(vec![
            ColumnSample::new("age", ages),
            ColumnSample::new("income", incomes),
        ]);
        assert!(rules.is_empty());
    }

    #[test]
    fn test_tolerated_violations_reduce_confidence() {
        let (ages, mut incomes) = ages_and_incomes(100);
        let minor = ages.iter().position(|&a| a < 18).unwrap();
        incomes[minor] = 500;
        let rules = synthesize(vec![
            ColumnSample::new("age", ages),
            ColumnSample::new("income", incomes),
        ]);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].score_basis.confidence < 1.0);
        assert!(rules[0].description.contains("within tolerance"));
    }

    #[test]
    fn test_date_order_rule() {
        let starts: Vec<String> = (1..=28).map(|d| format!("2024-01-{d:02}")).collect();
        let ends: Vec<String> = (1..=28).map(|d| format!("2024-02-{d:02}")).collect();
        let rules = synthesize(vec![
            ColumnSample::new("start_date", starts.iter().map(String::as_str).collect::<Vec<_>>()),
            ColumnSample::new("end_date", ends.iter().map(String::as_str).collect::<Vec<_>>()),
        ]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].conditions[0].to_string(), "start_date <= end_date");
        assert_eq!(rules[0].rule_name, "consistency_date_order_start_date_end_date");
    }

    #[test]
    fn test_birth_before_event() {
        let births: Vec<String> = (1..=28).map(|d| format!("1990-03-{d:02}")).collect();
        let joined: Vec<String> = (1..=28).map(|d| format!("2015-06-{d:02}")).collect();
        let rules = synthesize(vec![
            ColumnSample::new("birth_date", births.iter().map(String::as_str).collect::<Vec<_>>()),
            ColumnSample::new("joined_date", joined.iter().map(String::as_str).collect::<Vec<_>>()),
        ]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].conditions[0].to_string(), "birth_date <= joined_date");
    }

    #[test]
    fn test_unrelated_columns_yield_nothing() {
        let rules = synthesize(vec![
            ColumnSample::new("colour", vec!["red", "blue"]),
            ColumnSample::new("weight", vec![1.5, 2.5]),
        ]);
        assert!(rules.is_empty());
    }

    /// An outstanding balance must be matched by a payment
    struct SettledBalance;

    impl ConsistencyPattern for SettledBalance {
        fn name(&self) -> &'static str {
            "settled_balance"
        }

        fn applicable(&self, columns: &[ColumnContext<'_>]) -> Vec<Vec<usize>> {
            let find = |name: &str| columns.iter().position(|c| c.name() == name);
            match (find("balance"), find("paid")) {
                (Some(balance), Some(paid)) => vec![vec![balance, paid]],
                _ => Vec::new(),
            }
        }

        fn build(&self, group: &[ColumnContext<'_>], env: &PatternEnv<'_>) -> Option<Rule> {
            let [balance, paid] = group else {
                return None;
            };
            let evidence = check_rows(balance, paid, |b, p| Some(b.as_f64()? <= 0.0 || p.as_f64()? > 0.0));
            let builder = RuleBuilder::new(RuleKind::Consistency)
                .name(format!("consistency_{}", self.name()))
                .operator(LogicalOperator::Or)
                .condition(Predicate::Compare {
                    column: balance.name().to_string(),
                    op: Comparison::Le,
                    value: 0.0,
                })
                .condition(Predicate::Compare {
                    column: paid.name().to_string(),
                    op: Comparison::Gt,
                    value: 0.0,
                })
                .description("An outstanding balance requires a payment.");
            finish(builder, group, evidence, env)
        }
    }

    #[test]
    fn test_registered_pattern_runs() {
        let mut registry = PatternRegistry::new();
        registry.register(Box::new(SettledBalance));
        assert_eq!(registry.names(), vec!["settled_balance"]);

        let balances: Vec<i64> = (0..40).map(|i| if i % 4 == 0 { 100 } else { 0 }).collect();
        let paid: Vec<i64> = balances.iter().map(|&b| if b > 0 { 50 } else { 0 }).collect();
        let analysis = Analysis::new(vec![
            ColumnSample::new("balance", balances),
            ColumnSample::new("paid", paid),
        ]);
        let rules = registry.synthesize(&analysis.contexts(), &EngineConfig::default());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].operator, LogicalOperator::Or);
        assert_eq!(rules[0].expression(), "balance <= 0 OR paid > 0");
        assert!(rules[0].description.contains("Checked against 40 rows; 0 contradicted it."));

        let unpaid = Analysis::new(vec![
            ColumnSample::new("balance", vec![100_i64; 10]),
            ColumnSample::new("paid", vec![0_i64; 10]),
        ]);
        assert!(registry.synthesize(&unpaid.contexts(), &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_ordinal_values() {
        assert_eq!(ordinal(&RawValue::from(3_i64)), Some(3.0));
        assert!(ordinal(&RawValue::from("2024-01-01")).is_some());
        assert_eq!(ordinal(&RawValue::from("soon")), None);
    }
}
