//! The inference pipeline
//!
//! ```text
//! Dataset ──► Profiler ──► Field classifier ──► Synthesizer ─┐
//!   (par per column)   (par per column)      (par per column) │ barrier
//!                                                             ▼
//!                                   Consistency patterns (all columns)
//!                                                             │
//!                  Conflict resolver ──► Refiner ──► Assembler ──► Policy
//! ```
//!
//! Each stage borrows the previous stage's output; nothing is shared
//! mutably, so the parallel stages need no locking.

use crate::classify::{FieldClassification, FieldClassifier};
use crate::config::EngineConfig;
use crate::dictionary::DataDictionary;
use crate::error::Result;
use crate::policy::{Assembly, Policy, PolicyAssembler};
use crate::profile::{recommended_sample_size, ColumnStatistics, Dataset, Profiler};
use crate::rules::{ColumnContext, ConflictResolver, PatternRegistry, Refiner, Synthesizer};
use rayon::prelude::*;
use std::collections::HashMap;

/// Infers governance policies from samples
pub struct PolicyEngine {
    config: EngineConfig,
    patterns: PatternRegistry,
}

impl PolicyEngine {
    /// Create an engine with the built-in consistency patterns
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            patterns: PatternRegistry::default(),
        })
    }

    /// Replace the consistency pattern registry
    pub fn with_patterns(mut self, patterns: PatternRegistry) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full pipeline over one sample and an optional dictionary
    pub fn infer(&self, dataset: &Dataset, dictionary: Option<&DataDictionary>) -> Result<Policy> {
        let config = &self.config;
        tracing::info!(
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            dictionary = dictionary.is_some(),
            "Inferring policy"
        );

        let statistics = Profiler::new(config).profile_all(dataset);
        let fields = self.classify(dataset, &statistics, dictionary)?;

        let contexts: Vec<ColumnContext<'_>> = dataset
            .columns()
            .iter()
            .zip(&statistics)
            .zip(&fields)
            .map(|((sample, stats), field)| ColumnContext {
                sample,
                stats,
                field,
                entry: dictionary.and_then(|d| d.get(&sample.name)),
            })
            .collect();

        let candidates = Synthesizer::new(config).synthesize_all(&contexts);
        let consistency = self.patterns.synthesize(&contexts, config);
        tracing::info!(
            single_column = candidates.len(),
            consistency = consistency.len(),
            "Synthesized rule candidates"
        );

        let resolution = ConflictResolver::new(config).resolve(candidates);
        let mut rules = resolution.rules;
        rules.extend(consistency);

        let column_order: HashMap<String, usize> = dataset
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let rules = Refiner::new(config).refine(rules, &column_order);

        let (recommended, mut caveats) = self.sample_size_caveats(dataset)?;
        if dictionary.is_none() {
            caveats.push(
                "No data dictionary was supplied; every classification is heuristic.".to_string(),
            );
        }

        PolicyAssembler::new(config).assemble(Assembly {
            dataset,
            dictionary,
            statistics,
            fields,
            rules,
            conflicts: resolution.conflicts,
            caveats,
            recommended_sample_size: recommended,
        })
    }

    fn classify(
        &self,
        dataset: &Dataset,
        statistics: &[ColumnStatistics],
        dictionary: Option<&DataDictionary>,
    ) -> Result<Vec<FieldClassification>> {
        let classifier = FieldClassifier::new(&self.config)?;
        Ok(dataset
            .columns()
            .par_iter()
            .zip(statistics.par_iter())
            .map(|(column, stats)| {
                classifier.classify(column, stats, dictionary.and_then(|d| d.get(&column.name)))
            })
            .collect())
    }

    fn sample_size_caveats(&self, dataset: &Dataset) -> Result<(Option<usize>, Vec<String>)> {
        let Some(population) = dataset.population_total() else {
            return Ok((None, Vec::new()));
        };
        let sampling = &self.config.sampling;
        let recommended = recommended_sample_size(
            population,
            sampling.confidence_level,
            sampling.margin_error,
            sampling.estimated_p,
        )?;

        let mut caveats = Vec::new();
        if dataset.row_count() < recommended {
            caveats.push(format!(
                "Sample has {} rows; {} are recommended for a population of {} at {:.0}% confidence and {:.0}% margin of error.",
                dataset.row_count(),
                recommended,
                population,
                sampling.confidence_level * 100.0,
                sampling.margin_error * 100.0
            ));
        }
        Ok((Some(recommended), caveats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ColumnSample;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.thresholds.z_multiplier = -1.0;
        assert!(PolicyEngine::new(config).is_err());
    }

    #[test]
    fn test_infer_without_dictionary() {
        let dataset = Dataset::new(vec![
            ColumnSample::new("customer_id", (1..=40_i64).collect::<Vec<_>>()),
            ColumnSample::new("tier", (0..40).map(|i| ["gold", "basic"][i % 2]).collect::<Vec<_>>()),
        ])
        .unwrap();
        let policy = engine().infer(&dataset, None).unwrap();
        assert_eq!(policy.fields().len(), 2);
        assert!(policy
            .metadata()
            .caveats
            .iter()
            .any(|c| c.contains("No data dictionary")));
        assert!(policy.rule("unique_customer_id").is_some());
        assert!(policy.rule("membership_tier").is_some());
    }

    #[test]
    fn test_sample_size_caveat() {
        let dataset = Dataset::new(vec![ColumnSample::new("x", vec![1_i64, 2, 3])])
            .unwrap()
            .with_population_total(10_000);
        let policy = engine().infer(&dataset, None).unwrap();
        assert_eq!(policy.metadata().recommended_sample_size, Some(370));
        assert!(policy
            .metadata()
            .caveats
            .iter()
            .any(|c| c.contains("370 are recommended")));
    }

    #[test]
    fn test_custom_pattern_registry() {
        let dataset = Dataset::new(vec![
            ColumnSample::new("age", (0..40_i64).map(|i| 10 + i).collect::<Vec<_>>()),
            ColumnSample::new("income", (0..40_i64).map(|i| if i < 8 { 0 } else { 1000 * i }).collect::<Vec<_>>()),
        ])
        .unwrap();
        let with_defaults = engine().infer(&dataset, None).unwrap();
        assert!(with_defaults
            .rules()
            .iter()
            .any(|r| r.rule_name.starts_with("consistency_minor_income")));

        let without = engine()
            .with_patterns(PatternRegistry::new())
            .infer(&dataset, None)
            .unwrap();
        assert!(without
            .rules()
            .iter()
            .all(|r| !r.rule_name.starts_with("consistency_")));
    }
}
