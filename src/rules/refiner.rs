//! Rule set refinement: deduplicate, rank, cut to budget
//!
//! Two rules are equivalent when they belong to the same operator class and
//! govern the same columns. Bound rules additionally need overlapping
//! intervals, and consistency rules identical conditions. The higher-scoring rule survives and records what it
//! superseded. Pinned rules never count against the budget.

use super::rule::Rule;
use crate::config::{EngineConfig, RefinementConfig};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Deduplicates, ranks and prunes rules
pub struct Refiner<'a> {
    refinement: &'a RefinementConfig,
}

impl<'a> Refiner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            refinement: &config.refinement,
        }
    }

    /// Refine `rules`. `column_order` maps each column name to its
    /// declaration index and breaks score ties.
    pub fn refine(&self, rules: Vec<Rule>, column_order: &HashMap<String, usize>) -> Vec<Rule> {
        let total = rules.len();
        let mut rules = deduplicate(rules);
        let merged = total - rules.len();

        rank(&mut rules, column_order);

        let pinned = rules.iter().filter(|r| r.pinned).count();
        let mut budget = self.refinement.max_rules.saturating_sub(pinned);
        let before_budget = rules.len();
        rules.retain(|rule| {
            if rule.pinned {
                return true;
            }
            if budget == 0 {
                return false;
            }
            budget -= 1;
            true
        });

        unique_names(&mut rules);

        tracing::info!(
            candidates = total,
            merged,
            pruned = before_budget - rules.len(),
            pinned,
            kept = rules.len(),
            "Refined rule set"
        );
        rules
    }
}

/// Two rules express the same constraint
fn equivalent(a: &Rule, b: &Rule) -> bool {
    if a.kind.operator_class() != b.kind.operator_class() || a.applies_to != b.applies_to {
        return false;
    }
    match a.kind.operator_class() {
        "bound" => {}
        "consistency" => return a.conditions == b.conditions,
        _ => return true,
    }
    match (
        a.conditions.first().and_then(|c| c.interval()),
        b.conditions.first().and_then(|c| c.interval()),
    ) {
        (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => a_lo <= b_hi && b_lo <= a_hi,
        _ => false,
    }
}

/// Merge equivalent rules, keeping the higher score (ties keep the earlier rule)
fn deduplicate(rules: Vec<Rule>) -> Vec<Rule> {
    let mut kept: Vec<Rule> = Vec::with_capacity(rules.len());
    for rule in rules {
        match kept.iter().position(|existing| equivalent(existing, &rule)) {
            Some(index) => {
                let existing = &mut kept[index];
                let pinned = existing.pinned || rule.pinned;
                if rule.score > existing.score {
                    let superseded = std::mem::replace(existing, rule);
                    existing.add_note(&format!(
                        "Supersedes {}: {}.",
                        superseded.rule_name,
                        superseded.expression()
                    ));
                } else {
                    existing.add_note(&format!("Supersedes {}: {}.", rule.rule_name, rule.expression()));
                }
                existing.pinned = pinned;
            }
            None => kept.push(rule),
        }
    }
    kept
}

/// Score descending, then column declaration order, then name
fn rank(rules: &mut [Rule], column_order: &HashMap<String, usize>) {
    let first_column = |rule: &Rule| {
        rule.applies_to
            .iter()
            .filter_map(|c| column_order.get(c).copied())
            .min()
            .unwrap_or(usize::MAX)
    };
    rules.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| first_column(a).cmp(&first_column(b)))
            .then_with(|| a.rule_name.cmp(&b.rule_name))
    });
}

/// Suffix repeated names with `_1`, `_2`, ...
fn unique_names(rules: &mut [Rule]) {
    let mut seen = HashSet::new();
    for rule in rules.iter_mut() {
        let base = rule.rule_name.clone();
        let mut name = base.clone();
        let mut count = 0;
        while seen.contains(&name) {
            count += 1;
            name = format!("{}_{}", base, count);
        }
        seen.insert(name.clone());
        rule.rule_name = name;
    }
}
