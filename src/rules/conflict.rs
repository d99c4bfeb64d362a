//! Dictionary/sample conflict resolution
//!
//! Range and membership candidates carry both what the sample shows and
//! what the dictionary (or a canonical domain) declares. The resolver
//! decides which wins and records every disagreement:
//!
//! - Declared bounds win when plausible against the sample.
//! - Implausible declared bounds fall back to percentile bounds, with a
//!   conflict note and a confidence penalty.
//! - Canonical domains win over sample statistics unless the sample lies
//!   entirely outside them.
//! - A declared category set is never dropped silently.
//! - A declaration no rule can carry is recorded with the reason.

use super::rule::{Comparison, Predicate, Rule, RuleBuilder, RuleKind};
use super::scoring;
use super::synthesizer::{
    fmt_value, round_outward, BoundMethod, Candidate, MembershipEvidence, RangeEvidence,
    UnappliedDeclaration,
};
use crate::classify::Source;
use crate::config::{ConflictConfig, EngineConfig, ScoringConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a disagreement was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictOutcome {
    /// The declaration was kept despite the discrepancy
    DeclaredKept,
    /// The declaration was rejected in favour of sample-derived values
    SampleFallback,
    /// The column cannot carry the declared rule
    NotApplied,
}

/// A recorded disagreement between declared and observed values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub column: String,
    pub kind: RuleKind,
    pub declared: String,
    pub observed: String,
    pub outcome: ConflictOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl std::fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = match self.outcome {
            ConflictOutcome::DeclaredKept => "declaration kept",
            ConflictOutcome::SampleFallback => "fell back to sample",
            ConflictOutcome::NotApplied => "declaration not applied",
        };
        write!(
            f,
            "{} ({}): declared {}, observed {}; {}",
            self.column, self.kind, self.declared, self.observed, outcome
        )?;
        match &self.reason {
            Some(reason) => write!(f, " because {reason}"),
            None => Ok(()),
        }
    }
}

/// Finalized rules plus the conflicts met along the way
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub rules: Vec<Rule>,
    pub conflicts: Vec<ConflictRecord>,
}

pub(crate) fn fmt_interval(lo: Option<f64>, hi: Option<f64>) -> String {
    let side = |v: Option<f64>, open: &str| v.map_or_else(|| open.to_string(), fmt_value);
    format!("[{}, {}]", side(lo, "-inf"), side(hi, "+inf"))
}

pub(crate) fn fmt_set(values: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
    format!("{{{}}}", quoted.join(", "))
}

/// `[lo, hi]` with open sides contains `[a, b]`
fn contains(lo: Option<f64>, hi: Option<f64>, (a, b): (f64, f64)) -> bool {
    lo.map_or(true, |lo| lo <= a) && hi.map_or(true, |hi| b <= hi)
}

fn overlaps(lo: Option<f64>, hi: Option<f64>, (a, b): (f64, f64)) -> bool {
    lo.map_or(true, |lo| lo <= b) && hi.map_or(true, |hi| a <= hi)
}

/// Bound predicate for a (possibly one-sided) interval
fn bound_predicate(column: &str, lo: Option<f64>, hi: Option<f64>) -> Option<Predicate> {
    let column = column.to_string();
    match (lo, hi) {
        (Some(min), Some(max)) => Some(Predicate::Between { column, min, max }),
        (Some(value), None) => Some(Predicate::Compare {
            column,
            op: Comparison::Ge,
            value,
        }),
        (None, Some(value)) => Some(Predicate::Compare {
            column,
            op: Comparison::Le,
            value,
        }),
        (None, None) => None,
    }
}

/// Resolves range and membership candidates into rules
pub struct ConflictResolver<'a> {
    conflicts: &'a ConflictConfig,
    scoring: &'a ScoringConfig,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            conflicts: &config.conflicts,
            scoring: &config.scoring,
        }
    }

    /// Turn candidates into rules, in candidate order
    pub fn resolve(&self, candidates: Vec<Candidate>) -> Resolution {
        let mut resolution = Resolution::default();
        for candidate in candidates {
            let rule = match candidate {
                Candidate::Ready(rule) => Some(rule),
                Candidate::Range(evidence) => self.resolve_range(evidence, &mut resolution.conflicts),
                Candidate::Membership(evidence) => {
                    self.resolve_membership(evidence, &mut resolution.conflicts)
                }
                Candidate::Unapplied(declaration) => {
                    resolution.conflicts.push(self.not_applied(declaration));
                    None
                }
            };
            resolution.rules.extend(rule);
        }
        resolution
    }

    /// Declared bounds are plausible when they match the canonical domain,
    /// or when they cover enough of the observed robust interval without
    /// being wildly wider than it.
    pub fn plausible(
        &self,
        lo: Option<f64>,
        hi: Option<f64>,
        observed: (f64, f64),
        canonical: Option<(Option<f64>, Option<f64>)>,
    ) -> bool {
        if canonical == Some((lo, hi)) {
            return true;
        }
        let (a, b) = observed;
        let observed_width = b - a;
        let covered = if observed_width <= f64::EPSILON {
            contains(lo, hi, observed)
        } else {
            let start = lo.map_or(a, |lo| lo.max(a));
            let end = hi.map_or(b, |hi| hi.min(b));
            (end - start).max(0.0) / observed_width >= self.conflicts.min_overlap_ratio
        };
        let declared_width = match (lo, hi) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0.0,
        };
        let not_too_wide =
            declared_width <= self.conflicts.plausibility_multiple * observed_width.max(1.0);
        covered && not_too_wide
    }

    fn resolve_range(&self, ev: RangeEvidence, conflicts: &mut Vec<ConflictRecord>) -> Option<Rule> {
        let observed_robust = ev.summary.robust_bounds();
        let observed_full = (ev.summary.min, ev.summary.max);
        let observed_text = format!(
            "[{}, {}] (p01-p99 [{}, {}], {} values)",
            fmt_value(observed_full.0),
            fmt_value(observed_full.1),
            fmt_value(observed_robust.0),
            fmt_value(observed_robust.1),
            ev.count
        );
        let canonical = ev.canonical.as_ref().map(|d| (d.min, d.max));
        let mut basis = ev.basis;
        let mut notes = Vec::new();

        let (lo, hi, description) = if ev.has_declared_bounds() {
            let lo = ev.declared_min.or(canonical.and_then(|c| c.0));
            let hi = ev.declared_max.or(canonical.and_then(|c| c.1));
            let declared_text = fmt_interval(lo, hi);

            if self.plausible(lo, hi, observed_robust, canonical) {
                let description = format!(
                    "Values of '{}' must lie within the declared bounds {} (source: {}); observed range {}.",
                    ev.column,
                    declared_text,
                    Source::Dictionary,
                    observed_text
                );
                if contains(lo, hi, observed_full) {
                    notes.push("Low discrepancy: every observed value lies within the declared bounds.".to_string());
                } else {
                    notes.push(format!(
                        "Discrepancy: some observed values fall outside {declared_text}; the declared bounds are plausible and were kept."
                    ));
                    basis = basis.penalize(self.scoring.conflict_penalty);
                    conflicts.push(self.record(&ev.column, RuleKind::Range, declared_text, observed_text, ConflictOutcome::DeclaredKept));
                }
                (lo, hi, description)
            } else {
                let (a, b) = round_outward(observed_robust.0, observed_robust.1);
                let description = format!(
                    "Values of '{}' must lie within the sample percentile bounds [{}, {}] (source: {}).",
                    ev.column,
                    fmt_value(a),
                    fmt_value(b),
                    Source::StatisticalDefault
                );
                notes.push(format!(
                    "Conflict: the declared bounds {} are implausible against the observed range {} and were not applied.",
                    declared_text, observed_text
                ));
                basis = basis.penalize(self.scoring.conflict_penalty);
                conflicts.push(self.record(&ev.column, RuleKind::Range, declared_text, observed_text, ConflictOutcome::SampleFallback));
                (Some(a), Some(b), description)
            }
        } else if let Some(domain) = &ev.canonical {
            let canonical_text = fmt_interval(domain.min, domain.max);
            if overlaps(domain.min, domain.max, observed_full) {
                let description = format!(
                    "Values of '{}' must lie within the canonical {} domain {} (source: {}); observed range {}.",
                    ev.column,
                    domain.name,
                    canonical_text,
                    Source::NameHeuristic,
                    observed_text
                );
                if !contains(domain.min, domain.max, observed_full) {
                    notes.push(format!(
                        "Some observed values fall outside the canonical {} domain and are treated as errors.",
                        domain.name
                    ));
                }
                (domain.min, domain.max, description)
            } else {
                let (a, b) = round_outward(observed_robust.0, observed_robust.1);
                let description = format!(
                    "Values of '{}' must lie within the sample percentile bounds [{}, {}] (source: {}).",
                    ev.column,
                    fmt_value(a),
                    fmt_value(b),
                    Source::StatisticalDefault
                );
                notes.push(format!(
                    "Conflict: every observed value lies outside the canonical {} domain {}; the domain was not applied.",
                    domain.name, canonical_text
                ));
                basis = basis.penalize(self.scoring.conflict_penalty);
                conflicts.push(self.record(&ev.column, RuleKind::Range, canonical_text, observed_text, ConflictOutcome::SampleFallback));
                (Some(a), Some(b), description)
            }
        } else {
            let (a, b) = ev.sample_bounds;
            let description = match &ev.method {
                BoundMethod::ZScore { mean, stddev, k } => format!(
                    "Values of '{}' should lie within mean +/- {}*stddev = [{}, {}] (mean {}, stddev {} over {} values; source: {}).",
                    ev.column,
                    fmt_value(*k),
                    fmt_value(a),
                    fmt_value(b),
                    fmt_value(*mean),
                    fmt_value(*stddev),
                    ev.count,
                    Source::StatisticalDefault
                ),
                BoundMethod::Percentile { lower_q, upper_q, reason } => format!(
                    "Values of '{}' should lie within the p{}-p{} percentile interval [{}, {}] (source: {}). Robust fallback used: {}.",
                    ev.column,
                    fmt_value(lower_q * 100.0),
                    fmt_value(upper_q * 100.0),
                    fmt_value(a),
                    fmt_value(b),
                    Source::StatisticalDefault,
                    reason
                ),
            };
            (Some(a), Some(b), description)
        };

        let condition = bound_predicate(&ev.column, lo, hi)?;
        let two_sided = lo.is_some() && hi.is_some();
        let basis = if two_sided { basis } else { basis.with_specificity(basis.specificity.min(0.5)) };

        let mut builder = RuleBuilder::new(RuleKind::Range)
            .condition(condition)
            .description(description)
            .score(scoring::score(basis, self.scoring), basis);
        for note in notes {
            builder = builder.note(note);
        }
        builder.build().ok()
    }

    fn resolve_membership(
        &self,
        ev: MembershipEvidence,
        conflicts: &mut Vec<ConflictRecord>,
    ) -> Option<Rule> {
        let mut basis = ev.basis;
        let mut notes = Vec::new();

        let (values, description) = match ev.declared {
            None => {
                let description = format!(
                    "Values of '{}' must be one of the {} observed categories {} (source: {}).",
                    ev.column,
                    ev.observed.len(),
                    fmt_set(&ev.observed),
                    Source::StatisticalDefault
                );
                if ev.low_confidence {
                    notes.push(format!(
                        "Caveat: only {} values were observed, so the set may be incomplete.",
                        ev.count
                    ));
                }
                (ev.observed, description)
            }
            Some(declared) => {
                let undeclared: BTreeSet<String> = ev.observed.difference(&declared).cloned().collect();
                let share = if ev.observed.is_empty() {
                    1.0
                } else {
                    (ev.observed.len() - undeclared.len()) as f64 / ev.observed.len() as f64
                };

                if share >= self.conflicts.min_overlap_ratio || !ev.exhaustive {
                    let description = format!(
                        "Values of '{}' must be one of the {} declared values {} (source: {}).",
                        ev.column,
                        declared.len(),
                        fmt_set(&declared),
                        Source::Dictionary
                    );
                    if undeclared.is_empty() {
                        notes.push("Low discrepancy: every observed value is declared.".to_string());
                    } else {
                        notes.push(format!(
                            "Discrepancy: observed values {} are not declared; the declared set was kept.",
                            fmt_set(&undeclared)
                        ));
                        basis = basis.penalize(self.scoring.conflict_penalty);
                        conflicts.push(self.record(
                            &ev.column,
                            RuleKind::Membership,
                            fmt_set(&declared),
                            fmt_set(&ev.observed),
                            ConflictOutcome::DeclaredKept,
                        ));
                    }
                    (declared, description)
                } else {
                    let description = format!(
                        "Values of '{}' must be one of the {} observed categories {} (source: {}).",
                        ev.column,
                        ev.observed.len(),
                        fmt_set(&ev.observed),
                        Source::StatisticalDefault
                    );
                    notes.push(format!(
                        "Conflict: only {:.0}% of observed categories appear in the declared set {}; the observed set was used instead.",
                        share * 100.0,
                        fmt_set(&declared)
                    ));
                    basis = basis.penalize(self.scoring.conflict_penalty);
                    conflicts.push(self.record(
                        &ev.column,
                        RuleKind::Membership,
                        fmt_set(&declared),
                        fmt_set(&ev.observed),
                        ConflictOutcome::SampleFallback,
                    ));
                    (ev.observed, description)
                }
            }
        };

        if values.is_empty() {
            return None;
        }
        let mut builder = RuleBuilder::new(RuleKind::Membership)
            .condition(Predicate::InSet {
                column: ev.column.clone(),
                values,
            })
            .description(description)
            .score(scoring::score(basis, self.scoring), basis);
        for note in notes {
            builder = builder.note(note);
        }
        builder.build().ok()
    }

    fn record(
        &self,
        column: &str,
        kind: RuleKind,
        declared: String,
        observed: String,
        outcome: ConflictOutcome,
    ) -> ConflictRecord {
        let record = ConflictRecord {
            column: column.to_string(),
            kind,
            declared,
            observed,
            outcome,
            reason: None,
        };
        tracing::warn!(conflict = %record, "Dictionary and sample disagree");
        record
    }

    fn not_applied(&self, declaration: UnappliedDeclaration) -> ConflictRecord {
        let record = ConflictRecord {
            column: declaration.column,
            kind: declaration.kind,
            declared: declaration.declared,
            observed: declaration.observed,
            outcome: ConflictOutcome::NotApplied,
            reason: Some(declaration.reason),
        };
        tracing::warn!(conflict = %record, "Dictionary declaration not applied");
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DomainEntry;
    use crate::rules::scoring::ScoreInputs;
    use crate::profile::NumericSummary;

    fn summary(min: f64, max: f64, p01: f64, p99: f64) -> NumericSummary {
        NumericSummary {
            mean: (min + max) / 2.0,
            stddev: Some((max - min) / 4.0),
            min,
            max,
            p01,
            p25: min,
            p50: (min + max) / 2.0,
            p75: max,
            p99,
            is_integer: true,
            outlier_count: 0,
            negative_count: 0,
        }
    }

    fn age_domain() -> DomainEntry {
        DomainEntry {
            name: "age".into(),
            tokens: vec!["age".into()],
            min: Some(0.0),
            max: Some(120.0),
        }
    }

    fn evidence(summary: NumericSummary, declared: (Option<f64>, Option<f64>)) -> RangeEvidence {
        RangeEvidence {
            column: "age".into(),
            sample_bounds: (summary.min, summary.max),
            method: BoundMethod::ZScore {
                mean: summary.mean,
                stddev: summary.stddev.unwrap_or(0.0),
                k: 3.0,
            },
            summary,
            count: 100,
            canonical: Some(age_domain()),
            declared_min: declared.0,
            declared_max: declared.1,
            basis: ScoreInputs::new(0.6, 1.0, 0.8),
        }
    }

    fn resolve(candidate: Candidate) -> Resolution {
        let config = EngineConfig::default();
        ConflictResolver::new(&config).resolve(vec![candidate])
    }

    #[test]
    fn test_plausible_declared_bounds_win() {
        let ev = evidence(summary(18.0, 65.0, 18.0, 65.0), (Some(0.0), Some(120.0)));
        let out = resolve(Candidate::Range(ev));
        let rule = &out.rules[0];
        assert_eq!(rule.conditions[0].interval(), Some((0.0, 120.0)));
        assert!(rule.description.contains("source: dictionary"));
        assert!(rule.description.contains("Low discrepancy"));
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn test_implausible_declared_bounds_fall_back() {
        let ev = evidence(summary(18.0, 90.0, 18.5, 89.5), (Some(0.0), Some(10.0)));
        let out = resolve(Candidate::Range(ev));
        let rule = &out.rules[0];
        assert_eq!(rule.conditions[0].interval(), Some((18.5, 89.5)));
        assert!(rule.description.contains("Conflict"));
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].outcome, ConflictOutcome::SampleFallback);
        assert!(rule.score_basis.confidence < 1.0);
    }

    #[test]
    fn test_overly_wide_declared_bounds_are_implausible() {
        let config = EngineConfig::default();
        let resolver = ConflictResolver::new(&config);
        assert!(!resolver.plausible(Some(0.0), Some(1e6), (10.0, 20.0), None));
        assert!(resolver.plausible(Some(0.0), Some(50.0), (10.0, 20.0), None));
        assert!(resolver.plausible(Some(0.0), Some(120.0), (10.0, 20.0), Some((Some(0.0), Some(120.0)))));
    }

    #[test]
    fn test_degenerate_observed_interval() {
        let config = EngineConfig::default();
        let resolver = ConflictResolver::new(&config);
        assert!(resolver.plausible(Some(0.0), Some(10.0), (7.0, 7.0), None));
        assert!(!resolver.plausible(Some(0.0), Some(5.0), (7.0, 7.0), None));
    }

    #[test]
    fn test_partial_overlap_kept_with_penalty() {
        let ev = evidence(summary(10.0, 70.0, 10.0, 70.0), (Some(0.0), Some(60.0)));
        let out = resolve(Candidate::Range(ev));
        let rule = &out.rules[0];
        assert_eq!(rule.conditions[0].interval(), Some((0.0, 60.0)));
        assert!(rule.description.contains("Discrepancy"));
        assert_eq!(out.conflicts[0].outcome, ConflictOutcome::DeclaredKept);
    }

    #[test]
    fn test_canonical_domain_without_dictionary() {
        let ev = evidence(summary(18.0, 65.0, 18.0, 65.0), (None, None));
        let out = resolve(Candidate::Range(ev));
        let rule = &out.rules[0];
        assert_eq!(rule.conditions[0].interval(), Some((0.0, 120.0)));
        assert!(rule.description.contains("canonical age domain"));
        assert!(rule.description.contains("source: name heuristic"));
    }

    #[test]
    fn test_sample_outside_canonical_domain() {
        let ev = evidence(summary(500.0, 900.0, 505.0, 895.0), (None, None));
        let out = resolve(Candidate::Range(ev));
        assert_eq!(out.rules[0].conditions[0].interval(), Some((505.0, 895.0)));
        assert_eq!(out.conflicts.len(), 1);
    }

    #[test]
    fn test_one_sided_canonical_domain() {
        let mut ev = evidence(summary(100.0, 900.0, 110.0, 890.0), (None, None));
        ev.canonical = Some(DomainEntry {
            name: "income".into(),
            tokens: vec!["income".into()],
            min: Some(0.0),
            max: None,
        });
        let out = resolve(Candidate::Range(ev));
        assert_eq!(
            out.rules[0].conditions[0],
            Predicate::Compare {
                column: "age".into(),
                op: Comparison::Ge,
                value: 0.0
            }
        );
    }

    fn membership(observed: &[&str], declared: Option<&[&str]>) -> MembershipEvidence {
        MembershipEvidence {
            column: "tier".into(),
            observed: observed.iter().map(|s| s.to_string()).collect(),
            exhaustive: true,
            declared: declared.map(|d| d.iter().map(|s| s.to_string()).collect()),
            count: 100,
            low_confidence: false,
            basis: ScoreInputs::new(0.6, 1.0, 0.9),
        }
    }

    #[test]
    fn test_declared_membership_set_kept() {
        let ev = membership(&["gold", "silver"], Some(&["gold", "silver", "bronze"]));
        let out = resolve(Candidate::Membership(ev));
        let rule = &out.rules[0];
        assert!(matches!(&rule.conditions[0], Predicate::InSet { values, .. } if values.len() == 3));
        assert!(rule.description.contains("Low discrepancy"));
    }

    #[test]
    fn test_mismatched_declared_set_is_recorded() {
        let ev = membership(&["a", "b", "c", "d"], Some(&["x", "y"]));
        let out = resolve(Candidate::Membership(ev));
        let rule = &out.rules[0];
        assert!(matches!(&rule.conditions[0], Predicate::InSet { values, .. } if values.len() == 4));
        assert!(rule.description.contains("'x', 'y'"));
        assert_eq!(out.conflicts.len(), 1);
    }

    #[test]
    fn test_unapplied_declaration_is_recorded() {
        let declaration = UnappliedDeclaration {
            column: "account_id".into(),
            kind: RuleKind::Range,
            declared: "[1, 9999]".into(),
            observed: "numeric column with role identifier, 40 of 40 values present".into(),
            reason: "identifiers carry uniqueness and format rules, not range rules".into(),
        };
        let out = resolve(Candidate::Unapplied(declaration));
        assert!(out.rules.is_empty());
        assert_eq!(out.conflicts.len(), 1);
        let record = &out.conflicts[0];
        assert_eq!(record.outcome, ConflictOutcome::NotApplied);
        let text = record.to_string();
        assert!(text.contains("declared [1, 9999]"));
        assert!(text.contains("declaration not applied because identifiers carry"));
    }

    #[test]
    fn test_ready_rules_pass_through() {
        let rule = RuleBuilder::new(RuleKind::NotNull)
            .condition(Predicate::NotNull { column: "a".into() })
            .description("a must be present.")
            .build()
            .unwrap();
        let out = resolve(Candidate::Ready(rule.clone()));
        assert_eq!(out.rules, vec![rule]);
    }
}
