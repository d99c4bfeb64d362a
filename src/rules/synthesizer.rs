//! Single-column rule synthesis
//!
//! For every column the synthesizer proposes candidates:
//!
//! 1. **Range**: mean ± k·stddev, or the percentile interval when the
//!    column's statistics fell back; canonical and declared bounds are
//!    attached as evidence for the conflict resolver.
//! 2. **Non-negative**: every observed value is ≥ 0.
//! 3. **Membership**: the exact observed (or declared) category set.
//! 4. **Not-null**: critical or high-privacy columns without nulls.
//! 5. **Format**: declared regex, ISO-8601 for temporal columns, a
//!    detected content pattern, or an identifier shape.
//! 6. **Uniqueness**: identifiers whose observed values are all distinct.
//! 7. **Not-future**: temporal columns whose latest observed timestamp is
//!    not after the inference time.
//!
//! Identifiers never receive range rules. Columns that could not be
//! profiled receive no rules at all. A dictionary declaration that no rule
//! can carry comes back as [`Candidate::Unapplied`] so the resolver can
//! record it.

use super::rule::{Comparison, Predicate, Rule, RuleBuilder, RuleKind};
use super::scoring::{self, ScoreInputs};
use super::conflict::{fmt_interval, fmt_set};
use super::ColumnContext;
use crate::classify::{DomainEntry, Role, Source};
use crate::config::{EngineConfig, PrivacyLevel, ScoringConfig, ThresholdConfig};
use crate::profile::profiler::{canonical_number, parse_timestamp};
use crate::profile::{DType, NumericSummary};
use chrono::{NaiveDateTime, Utc};
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeSet;

/// ISO-8601 date or timestamp
pub const ISO_8601_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?$";

/// How sample-derived bounds were computed
#[derive(Debug, Clone, PartialEq)]
pub enum BoundMethod {
    ZScore { mean: f64, stddev: f64, k: f64 },
    Percentile {
        lower_q: f64,
        upper_q: f64,
        reason: String,
    },
}

/// Evidence for a range rule, finalized by the conflict resolver
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEvidence {
    pub column: String,
    pub summary: NumericSummary,
    pub count: usize,
    /// Bounds from the sample alone
    pub sample_bounds: (f64, f64),
    pub method: BoundMethod,
    /// Canonical domain recognized from the column name
    pub canonical: Option<DomainEntry>,
    pub declared_min: Option<f64>,
    pub declared_max: Option<f64>,
    pub basis: ScoreInputs,
}

impl RangeEvidence {
    pub fn has_declared_bounds(&self) -> bool {
        self.declared_min.is_some() || self.declared_max.is_some()
    }
}

/// Evidence for a membership rule, finalized by the conflict resolver
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipEvidence {
    pub column: String,
    pub observed: BTreeSet<String>,
    /// The observed set is complete and within the cardinality threshold
    pub exhaustive: bool,
    pub declared: Option<BTreeSet<String>>,
    pub count: usize,
    pub low_confidence: bool,
    pub basis: ScoreInputs,
}

/// A dictionary declaration the column cannot carry as a rule
#[derive(Debug, Clone, PartialEq)]
pub struct UnappliedDeclaration {
    pub column: String,
    pub kind: RuleKind,
    pub declared: String,
    pub observed: String,
    pub reason: String,
}

/// A synthesized rule candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// Complete rule needing no reconciliation
    Ready(Rule),
    Range(RangeEvidence),
    Membership(MembershipEvidence),
    Unapplied(UnappliedDeclaration),
}

/// Widen `[lo, hi]` to four decimals without cutting into it
pub(crate) fn round_outward(lo: f64, hi: f64) -> (f64, f64) {
    const SCALE: f64 = 10_000.0;
    ((lo * SCALE).floor() / SCALE, (hi * SCALE).ceil() / SCALE)
}

pub(crate) fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// Single-column rule synthesizer
pub struct Synthesizer<'a> {
    thresholds: &'a ThresholdConfig,
    scoring: &'a ScoringConfig,
    /// Timestamps after this instant are in the future
    now: NaiveDateTime,
}

impl<'a> Synthesizer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            thresholds: &config.thresholds,
            scoring: &config.scoring,
            now: Utc::now().naive_utc(),
        }
    }

    /// Judge timestamps against `now` instead of the current time
    pub fn with_reference_time(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Synthesize candidates for every column in parallel; output follows
    /// declaration order.
    pub fn synthesize_all(&self, columns: &[ColumnContext<'_>]) -> Vec<Candidate> {
        columns
            .par_iter()
            .map(|ctx| self.synthesize(ctx))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// Synthesize candidates for one column
    pub fn synthesize(&self, ctx: &ColumnContext<'_>) -> Vec<Candidate> {
        if ctx.stats.dtype_guess == DType::Unknown || ctx.stats.count == 0 {
            tracing::debug!(column = ctx.name(), "No rules for unprofiled column");
            let reason = if ctx.stats.count == 0 {
                "no non-null values were observed"
            } else {
                "the column could not be profiled"
            };
            return [RuleKind::Range, RuleKind::Membership, RuleKind::Format]
                .into_iter()
                .filter_map(|kind| unapplied(ctx, kind, reason))
                .collect();
        }

        let basis = ScoreInputs::new(
            scoring::criticality(&ctx.field.sensitivity),
            scoring::confidence(ctx.stats, self.scoring),
            0.0,
        );

        let mut candidates = Vec::new();
        candidates.extend(self.range(ctx, basis));
        candidates.extend(self.non_negative(ctx, basis).map(Candidate::Ready));
        candidates.extend(self.membership(ctx, basis));
        candidates.extend(self.not_null(ctx, basis).map(Candidate::Ready));
        candidates.extend(self.format(ctx, basis).map(Candidate::Ready));
        candidates.extend(self.uniqueness(ctx, basis).map(Candidate::Ready));
        candidates.extend(self.not_future(ctx, basis).map(Candidate::Ready));

        tracing::debug!(
            column = ctx.name(),
            candidates = candidates.len(),
            "Synthesized column candidates"
        );
        candidates
    }

    fn range(&self, ctx: &ColumnContext<'_>, basis: ScoreInputs) -> Option<Candidate> {
        if ctx.field.is_identifier() {
            return unapplied(ctx, RuleKind::Range, "identifiers carry uniqueness and format rules, not range rules");
        }
        let stats = ctx.stats;
        let Some(summary) = stats.numeric.as_ref() else {
            return unapplied(ctx, RuleKind::Range, "the column holds no numeric values");
        };
        let k = self.thresholds.z_multiplier;

        let usable_stddev = summary
            .stddev
            .filter(|s| !stats.robust_fallback_used && s.is_finite() && *s > 0.0);
        let (method, bounds) = match usable_stddev {
            Some(stddev) => (
                BoundMethod::ZScore {
                    mean: summary.mean,
                    stddev,
                    k,
                },
                round_outward(summary.mean - k * stddev, summary.mean + k * stddev),
            ),
            None => {
                let reason = if stats.low_confidence {
                    format!("only {} valid values were observed", stats.count)
                } else {
                    "the standard deviation is zero or not computable".to_string()
                };
                (
                    BoundMethod::Percentile {
                        lower_q: self.thresholds.lower_percentile,
                        upper_q: self.thresholds.upper_percentile,
                        reason,
                    },
                    round_outward(summary.p01, summary.p99),
                )
            }
        };

        let two_sided = ctx.field.role.domain.as_ref().map_or(true, |d| d.min.is_some() && d.max.is_some());
        Some(Candidate::Range(RangeEvidence {
            column: stats.name.clone(),
            summary: summary.clone(),
            count: stats.count,
            sample_bounds: bounds,
            method,
            canonical: ctx.field.role.domain.clone(),
            declared_min: ctx.entry.and_then(|e| e.min),
            declared_max: ctx.entry.and_then(|e| e.max),
            basis: basis.with_specificity(if two_sided { 0.8 } else { 0.5 }),
        }))
    }

    fn non_negative(&self, ctx: &ColumnContext<'_>, basis: ScoreInputs) -> Option<Rule> {
        if ctx.field.is_identifier() {
            return None;
        }
        let summary = ctx.stats.numeric.as_ref()?;
        if summary.negative_count > 0 || summary.min < 0.0 {
            return None;
        }
        let basis = basis.with_specificity(0.3);
        RuleBuilder::new(RuleKind::NonNegative)
            .condition(Predicate::Compare {
                column: ctx.name().to_string(),
                op: Comparison::Ge,
                value: 0.0,
            })
            .description(format!(
                "Values of '{}' must be non-negative: all {} observed values are >= 0 (minimum {}; source: {}).",
                ctx.name(),
                ctx.stats.count,
                fmt_value(summary.min),
                Source::StatisticalDefault
            ))
            .score(scoring::score(basis, self.scoring), basis)
            .build()
            .ok()
    }

    fn membership(&self, ctx: &ColumnContext<'_>, basis: ScoreInputs) -> Option<Candidate> {
        let stats = ctx.stats;
        if ctx.field.is_identifier() {
            return unapplied(ctx, RuleKind::Membership, "identifiers carry uniqueness and format rules, not membership rules");
        }
        // Numeric values are compared in their profiled text form
        let declared: Option<BTreeSet<String>> = ctx.entry.and_then(|e| e.allowed_values.as_ref()).map(|values| {
            values
                .iter()
                .map(|v| {
                    let v = v.trim();
                    match v.parse::<f64>() {
                        Ok(x) if stats.is_numeric() && x.is_finite() => canonical_number(x),
                        _ => v.to_string(),
                    }
                })
                .collect()
        });
        let needs_declaration = stats.dtype_guess == DType::Boolean
            || (stats.is_numeric() && ctx.field.role.role.value != Role::Dimension);
        if declared.is_none() && needs_declaration {
            return None;
        }
        let Some(categories) = stats.categorical.as_ref() else {
            return unapplied(ctx, RuleKind::Membership, "no categories were observed");
        };
        let exhaustive = !categories.truncated
            && stats.cardinality <= self.thresholds.categorical_cardinality;
        if declared.is_none() && !exhaustive {
            return None;
        }

        let size = declared.as_ref().map_or(stats.cardinality, BTreeSet::len);
        let threshold = self.thresholds.categorical_cardinality.max(1) as f64;
        let specificity = 1.0 - 0.5 * (size.saturating_sub(1) as f64 / threshold).min(1.0);

        Some(Candidate::Membership(MembershipEvidence {
            column: stats.name.clone(),
            observed: categories.observed_categories.clone(),
            exhaustive,
            declared,
            count: stats.count,
            low_confidence: stats.low_confidence,
            basis: basis.with_specificity(specificity),
        }))
    }

    fn not_null(&self, ctx: &ColumnContext<'_>, basis: ScoreInputs) -> Option<Rule> {
        let sensitivity = &ctx.field.sensitivity;
        let critical = sensitivity.critical_field.value;
        let high = sensitivity.privacy_level.value == PrivacyLevel::High;
        if !critical && !high {
            return None;
        }
        if ctx.stats.null_rate > self.thresholds.near_zero_null_rate {
            tracing::debug!(
                column = ctx.name(),
                null_rate = ctx.stats.null_rate,
                "Skipping not-null rule: nulls observed"
            );
            return None;
        }

        let reason = if critical {
            format!("a critical field ({})", sensitivity.critical_field.source)
        } else {
            format!("high privacy ({})", sensitivity.privacy_level.source)
        };
        let basis = basis.with_specificity(0.6);
        RuleBuilder::new(RuleKind::NotNull)
            .condition(Predicate::NotNull {
                column: ctx.name().to_string(),
            })
            .description(format!(
                "'{}' must not be null: the column is {}, and the observed null rate is {:.2}% over {} rows.",
                ctx.name(),
                reason,
                ctx.stats.null_rate * 100.0,
                ctx.stats.total
            ))
            .score(scoring::score(basis, self.scoring), basis)
            .pinned(critical)
            .build()
            .ok()
    }

    fn format(&self, ctx: &ColumnContext<'_>, basis: ScoreInputs) -> Option<Rule> {
        let field = ctx.field;
        let (pattern, rationale) = if let Some(declared) = ctx.entry.and_then(|e| e.format.clone()) {
            (declared, format!("the dictionary declares this format (source: {})", Source::Dictionary))
        } else if field.role.temporal.value {
            let rationale = if field.role.temporal.is_declared() {
                "the dictionary declares a datetime type; no format was declared, so the ISO-8601 convention is applied as a convention-based default".to_string()
            } else {
                format!(
                    "the column holds dates ({}); no format was declared, so the ISO-8601 convention is applied as a convention-based default",
                    field.role.temporal.source
                )
            };
            (ISO_8601_PATTERN.to_string(), rationale)
        } else if let Some(found) = field
            .sensitivity
            .content_match
            .as_ref()
            .filter(|m| m.enforceable)
        {
            (
                found.regex.clone(),
                format!(
                    "{:.0}% of scanned values match the {} pattern (source: {})",
                    found.ratio * 100.0,
                    found.pattern,
                    Source::StatisticalDefault
                ),
            )
        } else if field.is_identifier() {
            (
                identifier_pattern(ctx)?,
                format!(
                    "identifier shape inferred from observed values (source: {})",
                    Source::StatisticalDefault
                ),
            )
        } else {
            return None;
        };

        let regex = Regex::new(&pattern).ok()?;
        let values: Vec<String> = ctx
            .sample
            .values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| v.render())
            .collect();
        let matching = values.iter().filter(|v| regex.is_match(v)).count();
        let ratio = if values.is_empty() {
            1.0
        } else {
            matching as f64 / values.len() as f64
        };

        let basis = basis.penalize(ratio).with_specificity(0.7);
        let mut builder = RuleBuilder::new(RuleKind::Format)
            .condition(Predicate::Matches {
                column: ctx.name().to_string(),
                pattern,
            })
            .description(format!(
                "Values of '{}' must match the expected format: {}.",
                ctx.name(),
                rationale
            ))
            .score(scoring::score(basis, self.scoring), basis)
            .pinned(field.is_critical());
        if matching < values.len() {
            builder = builder.note(format!(
                "{} of {} observed values do not match.",
                values.len() - matching,
                values.len()
            ));
        }
        builder.build().ok()
    }

    fn uniqueness(&self, ctx: &ColumnContext<'_>, basis: ScoreInputs) -> Option<Rule> {
        if !ctx.field.is_identifier() || !ctx.stats.all_unique() || ctx.stats.count < 2 {
            return None;
        }
        let basis = basis.with_specificity(0.7);
        RuleBuilder::new(RuleKind::Uniqueness)
            .condition(Predicate::Unique {
                column: ctx.name().to_string(),
            })
            .description(format!(
                "Values of '{}' must be unique: all {} observed non-null values are distinct (role identifier, source: {}).",
                ctx.name(),
                ctx.stats.count,
                ctx.field.role.role.source
            ))
            .score(scoring::score(basis, self.scoring), basis)
            .build()
            .ok()
    }

    fn not_future(&self, ctx: &ColumnContext<'_>, basis: ScoreInputs) -> Option<Rule> {
        if !ctx.field.role.temporal.value {
            return None;
        }
        let parsed: Vec<NaiveDateTime> = ctx
            .sample
            .values
            .iter()
            .filter(|v| !v.is_null())
            .filter_map(|v| parse_timestamp(&v.render()).map(|(at, _, _)| at))
            .collect();
        let latest = *parsed.iter().max()?;
        if latest > self.now {
            tracing::debug!(
                column = ctx.name(),
                latest = %latest,
                "Skipping not-future rule: future timestamps observed"
            );
            return None;
        }

        let basis = basis.with_specificity(0.4);
        RuleBuilder::new(RuleKind::NotFuture)
            .condition(Predicate::NotFuture {
                column: ctx.name().to_string(),
            })
            .description(format!(
                "'{}' must not lie in the future: all {} parsed timestamps are on or before the inference time (latest {}; source: {}).",
                ctx.name(),
                parsed.len(),
                latest,
                Source::StatisticalDefault
            ))
            .score(scoring::score(basis, self.scoring), basis)
            .build()
            .ok()
    }
}

/// The declaration `kind` reads from the column's dictionary entry, if any
fn declaration(ctx: &ColumnContext<'_>, kind: RuleKind) -> Option<String> {
    let entry = ctx.entry?;
    match kind {
        RuleKind::Range => entry.has_bounds().then(|| fmt_interval(entry.min, entry.max)),
        RuleKind::Membership => entry
            .allowed_values
            .as_ref()
            .map(|values| fmt_set(&values.iter().map(|v| v.trim().to_string()).collect::<BTreeSet<_>>())),
        RuleKind::Format => entry.format.as_ref().map(|f| format!("pattern '{f}'")),
        _ => None,
    }
}

fn unapplied(ctx: &ColumnContext<'_>, kind: RuleKind, reason: &str) -> Option<Candidate> {
    let declared = declaration(ctx, kind)?;
    let stats = ctx.stats;
    Some(Candidate::Unapplied(UnappliedDeclaration {
        column: stats.name.clone(),
        kind,
        declared,
        observed: format!(
            "{} column with role {}, {} of {} values present",
            stats.dtype_guess, ctx.field.role.role.value, stats.count, stats.total
        ),
        reason: reason.to_string(),
    }))
}

/// Character-class and length pattern for identifier values
fn identifier_pattern(ctx: &ColumnContext<'_>) -> Option<String> {
    let quantifier = |min: usize, max: usize| {
        if min == max {
            format!("{{{min}}}")
        } else {
            format!("{{{min},{max}}}")
        }
    };

    if let Some(text) = &ctx.stats.text {
        if text.min_length == 0 {
            return None;
        }
        let class = if text.all_digits {
            r"\d"
        } else if text.all_word_chars {
            "[A-Za-z0-9_-]"
        } else {
            return None;
        };
        return Some(format!("^{class}{}$", quantifier(text.min_length, text.max_length)));
    }

    let summary = ctx.stats.numeric.as_ref()?;
    if !summary.is_integer || summary.min < 0.0 {
        return None;
    }
    let digits = |v: f64| (v as u64).to_string().len();
    Some(format!(r"^\d{}$", quantifier(digits(summary.min), digits(summary.max))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{FieldClassification, FieldClassifier};
    use crate::dictionary::DictionaryEntry;
    use crate::profile::{ColumnSample, ColumnStatistics, Profiler};
    use chrono::NaiveDate;

    struct Fixture {
        column: ColumnSample,
        stats: ColumnStatistics,
        field: FieldClassification,
        entry: Option<DictionaryEntry>,
    }

    fn fixture(column: ColumnSample, entry: Option<DictionaryEntry>) -> Fixture {
        let config = EngineConfig::default();
        let stats = Profiler::new(&config).profile(&column);
        let field = FieldClassifier::new(&config)
            .unwrap()
            .classify(&column, &stats, entry.as_ref());
        Fixture {
            column,
            stats,
            field,
            entry,
        }
    }

    fn candidates(f: &Fixture) -> Vec<Candidate> {
        let config = EngineConfig::default();
        let ctx = ColumnContext {
            sample: &f.column,
            stats: &f.stats,
            field: &f.field,
            entry: f.entry.as_ref(),
        };
        Synthesizer::new(&config).synthesize(&ctx)
    }

    fn ready(candidates: &[Candidate], kind: RuleKind) -> Option<&Rule> {
        candidates.iter().find_map(|c| match c {
            Candidate::Ready(rule) if rule.kind == kind => Some(rule),
            _ => None,
        })
    }

    fn range(candidates: &[Candidate]) -> Option<&RangeEvidence> {
        candidates.iter().find_map(|c| match c {
            Candidate::Range(ev) => Some(ev),
            _ => None,
        })
    }

    #[test]
    fn test_zscore_range() {
        let values: Vec<i64> = (0..100).map(|i| 1000 + (i * 37) % 500).collect();
        let f = fixture(ColumnSample::new("zorblax", values), None);
        let out = candidates(&f);
        let ev = range(&out).unwrap();
        let summary = f.stats.numeric.as_ref().unwrap();
        let stddev = summary.stddev.unwrap();
        assert!(matches!(ev.method, BoundMethod::ZScore { .. }));
        assert!(ev.sample_bounds.0 <= summary.mean - 3.0 * stddev);
        assert!(ev.sample_bounds.1 >= summary.mean + 3.0 * stddev);
        assert!(ev.sample_bounds.0 < ev.sample_bounds.1);
        assert!(ev.canonical.is_none());
    }

    #[test]
    fn test_percentile_fallback_for_constant_sample() {
        let f = fixture(ColumnSample::new("zorblax", vec![7_i64; 5]), None);
        let out = candidates(&f);
        let ev = range(&out).unwrap();
        assert!(matches!(ev.method, BoundMethod::Percentile { .. }));
        assert_eq!(ev.sample_bounds, (7.0, 7.0));
        assert!(ev.basis.confidence < 1.0);
    }

    #[test]
    fn test_identifier_gets_no_range() {
        let values: Vec<i64> = (0..50).map(|i| 100_000 + i).collect();
        let f = fixture(ColumnSample::new("customer_id", values), None);
        let out = candidates(&f);
        assert!(range(&out).is_none());
        assert!(ready(&out, RuleKind::NonNegative).is_none());
        assert!(ready(&out, RuleKind::Uniqueness).is_some());
        let format = ready(&out, RuleKind::Format).unwrap();
        assert_eq!(
            format.conditions[0],
            Predicate::Matches {
                column: "customer_id".into(),
                pattern: r"^\d{6}$".into()
            }
        );
    }

    #[test]
    fn test_membership_enumerates_observed_set() {
        let values: Vec<&str> = (0..60).map(|i| ["red", "green", "blue"][i % 3]).collect();
        let f = fixture(ColumnSample::new("colour", values), None);
        let out = candidates(&f);
        let ev = out
            .iter()
            .find_map(|c| match c {
                Candidate::Membership(ev) => Some(ev),
                _ => None,
            })
            .unwrap();
        assert_eq!(ev.observed.len(), 3);
        assert!(ev.exhaustive);
        assert!(ev.declared.is_none());
    }

    #[test]
    fn test_governance_for_sensitive_column() {
        let values: Vec<String> = (0..40).map(|i| format!("user{i}@example.org")).collect();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        let f = fixture(ColumnSample::new("email", values), None);
        let out = candidates(&f);

        let not_null = ready(&out, RuleKind::NotNull).unwrap();
        assert!(not_null.pinned);
        assert!(not_null.description.contains("critical field"));

        let format = ready(&out, RuleKind::Format).unwrap();
        assert!(format.pinned);
        assert!(format.description.contains("email pattern"));
        assert!(!format.description.contains("do not match"));
    }

    #[test]
    fn test_nulls_suppress_not_null_rule() {
        let mut values: Vec<Option<&str>> = vec![Some("a@b.io"); 30];
        values.extend([None, None, None]);
        let f = fixture(ColumnSample::new("email", values), None);
        assert!(ready(&candidates(&f), RuleKind::NotNull).is_none());
    }

    #[test]
    fn test_temporal_format_is_convention() {
        let values: Vec<String> = (1..=28).map(|d| format!("2024-03-{d:02}")).collect();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        let f = fixture(ColumnSample::new("created", values), None);
        let format = ready(&candidates(&f), RuleKind::Format).unwrap().clone();
        assert!(format.description.contains("convention-based default"));
        assert!(!format.pinned);
    }

    #[test]
    fn test_past_timestamps_get_not_future_rule() {
        let values: Vec<String> = (1..=28).map(|d| format!("2024-03-{d:02}")).collect();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        let f = fixture(ColumnSample::new("created", values), None);
        let rule = ready(&candidates(&f), RuleKind::NotFuture).unwrap().clone();
        assert_eq!(
            rule.conditions[0],
            Predicate::NotFuture {
                column: "created".into()
            }
        );
        assert_eq!(rule.expression(), "created <= NOW()");
        assert!(rule.description.contains("all 28 parsed timestamps"));
        assert!(rule.description.contains("latest 2024-03-28 00:00:00"));
    }

    #[test]
    fn test_future_timestamps_get_no_not_future_rule() {
        let values: Vec<String> = (1..=28).map(|d| format!("2024-03-{d:02}")).collect();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        let f = fixture(ColumnSample::new("created", values), None);
        let config = EngineConfig::default();
        let ctx = ColumnContext {
            sample: &f.column,
            stats: &f.stats,
            field: &f.field,
            entry: None,
        };
        let before = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let out = Synthesizer::new(&config).with_reference_time(before).synthesize(&ctx);
        assert!(ready(&out, RuleKind::NotFuture).is_none());
        assert!(ready(&out, RuleKind::Format).is_some());
    }

    #[test]
    fn test_declared_format_wins() {
        let entry = DictionaryEntry {
            format: Some(r"^[A-Z]{2}$".to_string()),
            ..Default::default()
        };
        let f = fixture(ColumnSample::new("country", vec!["GB", "FR", "fr"]), Some(entry));
        let format = ready(&candidates(&f), RuleKind::Format).unwrap().clone();
        assert!(format.description.contains("dictionary declares"));
        assert!(format.description.contains("1 of 3 observed values do not match"));
    }

    #[test]
    fn test_unknown_column_yields_nothing() {
        let f = fixture(ColumnSample::new("broken", vec![None::<i64>; 4]), None);
        assert!(candidates(&f).is_empty());
    }

    fn unapplied_of(candidates: &[Candidate], kind: RuleKind) -> Option<&UnappliedDeclaration> {
        candidates.iter().find_map(|c| match c {
            Candidate::Unapplied(d) if d.kind == kind => Some(d),
            _ => None,
        })
    }

    fn membership_of(candidates: &[Candidate]) -> Option<&MembershipEvidence> {
        candidates.iter().find_map(|c| match c {
            Candidate::Membership(ev) => Some(ev),
            _ => None,
        })
    }

    #[test]
    fn test_declared_set_on_numeric_fact() {
        let values: Vec<i64> = (0..60).map(|i| 1 + i % 5).collect();
        let entry = DictionaryEntry {
            role: Some(Role::Fact),
            allowed_values: Some(vec!["1".into(), "2".into(), "3".into(), "4".into(), "5.0".into()]),
            ..Default::default()
        };
        let f = fixture(ColumnSample::new("score", values), Some(entry));
        assert_eq!(f.field.role.role.value, Role::Fact);

        let out = candidates(&f);
        let ev = membership_of(&out).unwrap();
        let declared = ev.declared.as_ref().unwrap();
        assert_eq!(declared.len(), 5);
        assert!(declared.contains("5"));
        assert!(ev.observed.is_subset(declared));
        assert!(unapplied_of(&out, RuleKind::Membership).is_none());
    }

    #[test]
    fn test_declared_set_on_boolean_column() {
        let values: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
        let entry = DictionaryEntry {
            allowed_values: Some(vec!["true".into(), "false".into()]),
            ..Default::default()
        };
        let f = fixture(ColumnSample::new("active", values), Some(entry));
        assert!(membership_of(&candidates(&f)).is_some());

        let f = fixture(ColumnSample::new("active", vec![true, false, true]), None);
        assert!(membership_of(&candidates(&f)).is_none());
    }

    #[test]
    fn test_bounds_declared_on_identifier_are_recorded() {
        let values: Vec<i64> = (0..40).map(|i| 1000 + i).collect();
        let entry = DictionaryEntry {
            role: Some(Role::Identifier),
            min: Some(1.0),
            max: Some(9999.0),
            allowed_values: Some(vec!["1000".into()]),
            ..Default::default()
        };
        let f = fixture(ColumnSample::new("account_id", values), Some(entry));
        let out = candidates(&f);
        assert!(range(&out).is_none());
        assert!(membership_of(&out).is_none());

        let bounds = unapplied_of(&out, RuleKind::Range).unwrap();
        assert_eq!(bounds.declared, "[1, 9999]");
        assert!(bounds.reason.contains("identifiers"));
        assert!(bounds.observed.contains("role identifier"));

        let set = unapplied_of(&out, RuleKind::Membership).unwrap();
        assert_eq!(set.declared, "{'1000'}");
    }

    #[test]
    fn test_bounds_declared_on_text_are_recorded() {
        let values: Vec<&str> = (0..30).map(|i| ["red", "green", "blue"][i % 3]).collect();
        let entry = DictionaryEntry {
            min: Some(0.0),
            ..Default::default()
        };
        let f = fixture(ColumnSample::new("colour", values), Some(entry));
        let out = candidates(&f);
        let bounds = unapplied_of(&out, RuleKind::Range).unwrap();
        assert_eq!(bounds.declared, "[0, +inf]");
        assert_eq!(bounds.reason, "the column holds no numeric values");
        assert!(membership_of(&out).is_some());
    }

    #[test]
    fn test_unprofiled_column_reports_declarations() {
        let entry = DictionaryEntry {
            min: Some(0.0),
            max: Some(10.0),
            allowed_values: Some(vec!["a".into()]),
            format: Some(r"^\d+$".into()),
            ..Default::default()
        };
        let f = fixture(ColumnSample::new("broken", vec![None::<i64>; 4]), Some(entry));
        let out = candidates(&f);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| matches!(c, Candidate::Unapplied(d) if d.reason == "no non-null values were observed")));
        assert_eq!(unapplied_of(&out, RuleKind::Format).unwrap().declared, r"pattern '^\d+$'");

        let f = fixture(ColumnSample::new("broken", vec![None::<i64>; 4]), None);
        assert!(candidates(&f).is_empty());
    }

    #[test]
    fn test_round_outward() {
        assert_eq!(round_outward(1.23456, 2.34561), (1.2345, 2.3457));
        assert_eq!(round_outward(-1.00001, 1.0), (-1.0001, 1.0));
    }

    #[test]
    fn test_fmt_value() {
        assert_eq!(fmt_value(120.0), "120");
        assert_eq!(fmt_value(3.14159), "3.1416");
        assert_eq!(fmt_value(2.5), "2.5");
    }
}
