//! Column profiler
//!
//! Computes [`ColumnStatistics`] for every column of a [`Dataset`]. Columns
//! are independent, so profiling fans out across the rayon pool and the
//! results are collected back in declaration order.
//!
//! The profiler never fails a run: dirty tokens are counted as nulls,
//! small samples are flagged rather than withheld, and a column whose
//! values cannot be profiled at all degrades to an `unknown` record.

use super::sample::{ColumnSample, Dataset, RawValue};
use super::stats::{CategoricalSummary, ColumnStatistics, DType, NumericSummary, TextSummary};
use crate::config::{EngineConfig, ProfilingConfig, ThresholdConfig};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Accepted datetime layouts: (chrono format, date-only, ISO-8601).
const DATETIME_LAYOUTS: &[(&str, bool, bool)] = &[
    ("%Y-%m-%dT%H:%M:%S%.f", false, true),
    ("%Y-%m-%d %H:%M:%S%.f", false, true),
    ("%Y-%m-%dT%H:%M", false, true),
    ("%Y-%m-%d", true, true),
    ("%Y/%m/%d", true, false),
    ("%d/%m/%Y", true, false),
    ("%m/%d/%Y", true, false),
    ("%d-%m-%Y", true, false),
    ("%d/%m/%Y %H:%M", false, false),
    ("%d.%m.%Y", true, false),
];

/// Layout index reserved for RFC 3339 timestamps with offsets.
const RFC3339_LAYOUT: usize = usize::MAX;

/// Reasons a column cannot be profiled at all
#[derive(Debug, Error)]
enum ProfileError {
    #[error("{0} value(s) contain replacement characters (corrupt encoding)")]
    CorruptEncoding(usize),
}

/// Parse a datetime token into a timestamp, its layout index and whether
/// the layout is ISO-8601. Date-only values land at midnight.
pub fn parse_timestamp(text: &str) -> Option<(NaiveDateTime, usize, bool)> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some((parsed.naive_utc(), RFC3339_LAYOUT, true));
    }
    DATETIME_LAYOUTS
        .iter()
        .enumerate()
        .find_map(|(idx, (fmt, date_only, iso))| {
            let parsed = if *date_only {
                NaiveDate::parse_from_str(text, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            } else {
                NaiveDateTime::parse_from_str(text, fmt).ok()
            };
            parsed.map(|ts| (ts, idx, *iso))
        })
}

/// Linear interpolation between closest ranks of a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Canonical text for a parsed number, so `41`, `"41"` and `41.0` coincide.
pub fn canonical_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Column profiler
pub struct Profiler<'a> {
    profiling: &'a ProfilingConfig,
    thresholds: &'a ThresholdConfig,
}

impl<'a> Profiler<'a> {
    /// Create a profiler bound to the engine configuration
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            profiling: &config.profiling,
            thresholds: &config.thresholds,
        }
    }

    /// Profile every column in parallel; output follows declaration order.
    pub fn profile_all(&self, dataset: &Dataset) -> Vec<ColumnStatistics> {
        dataset
            .columns()
            .par_iter()
            .map(|column| self.profile(column))
            .collect()
    }

    /// Profile a single column. Never fails.
    pub fn profile(&self, column: &ColumnSample) -> ColumnStatistics {
        match self.try_profile(column) {
            Ok(stats) => {
                tracing::debug!(
                    column = %stats.name,
                    dtype = %stats.dtype_guess,
                    count = stats.count,
                    cardinality = stats.cardinality,
                    fallback = stats.robust_fallback_used,
                    "Profiled column"
                );
                stats
            }
            Err(e) => {
                tracing::warn!("Column '{}' could not be profiled: {}", column.name, e);
                ColumnStatistics::unknown(
                    column.name.clone(),
                    column.len(),
                    format!("statistics could not be computed: {e}"),
                )
            }
        }
    }

    fn try_profile(&self, column: &ColumnSample) -> Result<ColumnStatistics, ProfileError> {
        let corrupt = column
            .values
            .iter()
            .filter(|v| matches!(v, RawValue::Text(s) if s.contains('\u{FFFD}')))
            .count();
        if corrupt > 0 {
            return Err(ProfileError::CorruptEncoding(corrupt));
        }

        let total = column.len();
        let present: Vec<&RawValue> = column.values.iter().filter(|v| !v.is_null()).collect();
        if present.is_empty() {
            return Ok(ColumnStatistics::unknown(
                column.name.clone(),
                total,
                "column is entirely null",
            ));
        }

        if present.iter().all(|v| v.as_bool().is_some()) {
            let rendered: Vec<String> = present
                .iter()
                .filter_map(|v| v.as_bool())
                .map(|b| b.to_string())
                .collect();
            return Ok(self.finish(column, DType::Boolean, rendered, None, true, false, Vec::new()));
        }

        let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
        if !numbers.is_empty()
            && numbers.len() as f64 >= self.profiling.numeric_parse_ratio * present.len() as f64
        {
            return Ok(self.numeric(column, &present, numbers));
        }

        let rendered: Vec<String> = present.iter().map(|v| v.render()).collect();
        let layouts: Vec<Option<(usize, bool)>> = rendered
            .iter()
            .map(|s| parse_timestamp(s).map(|(_, layout, iso)| (layout, iso)))
            .collect();
        let parsed = layouts.iter().flatten().count();
        if parsed > 0 && parsed as f64 >= self.profiling.datetime_parse_ratio * present.len() as f64 {
            return Ok(self.datetime(column, rendered, &layouts));
        }

        let distinct: BTreeSet<&str> = rendered.iter().map(String::as_str).collect();
        let uniqueness = distinct.len() as f64 / rendered.len() as f64;
        let no_whitespace = rendered.iter().all(|s| !s.chars().any(char::is_whitespace));
        let dtype = if uniqueness >= self.profiling.identifier_uniqueness
            && rendered.len() >= self.profiling.min_sample_size
            && no_whitespace
        {
            DType::Identifier
        } else if distinct.len() <= self.thresholds.categorical_cardinality || uniqueness <= 0.5 {
            DType::Categorical
        } else {
            DType::Text
        };

        Ok(self.finish(column, dtype, rendered, None, true, false, Vec::new()))
    }

    fn numeric(&self, column: &ColumnSample, present: &[&RawValue], mut numbers: Vec<f64>) -> ColumnStatistics {
        let mut caveats = Vec::new();
        let unparsable = present.len() - numbers.len();
        if unparsable > 0 {
            caveats.push(format!(
                "{unparsable} non-numeric value(s) treated as null"
            ));
        }

        numbers.sort_by(f64::total_cmp);
        let n = numbers.len() as f64;
        let mean = numbers.iter().sum::<f64>() / n;
        let stddev = (numbers.len() > 1).then(|| {
            let var = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        });
        let p25 = percentile(&numbers, 0.25);
        let p75 = percentile(&numbers, 0.75);
        let iqr = p75 - p25;
        let (low_fence, high_fence) = (p25 - 1.5 * iqr, p75 + 1.5 * iqr);

        let summary = NumericSummary {
            mean,
            stddev,
            min: numbers[0],
            max: numbers[numbers.len() - 1],
            p01: percentile(&numbers, self.thresholds.lower_percentile),
            p25,
            p50: percentile(&numbers, 0.5),
            p75,
            p99: percentile(&numbers, self.thresholds.upper_percentile),
            is_integer: numbers.iter().all(|x| x.fract() == 0.0),
            outlier_count: numbers
                .iter()
                .filter(|x| **x < low_fence || **x > high_fence)
                .count(),
            negative_count: numbers.iter().filter(|x| **x < 0.0).count(),
        };
        if !summary.has_usable_spread() {
            caveats.push("standard deviation is zero or not computable".to_string());
        }

        let rendered = numbers.iter().map(|x| canonical_number(*x)).collect();
        self.finish(column, DType::Numeric, rendered, Some(summary), unparsable == 0, false, caveats)
    }

    fn datetime(
        &self,
        column: &ColumnSample,
        rendered: Vec<String>,
        layouts: &[Option<(usize, bool)>],
    ) -> ColumnStatistics {
        let mut caveats = Vec::new();
        let unparsable = layouts.iter().filter(|l| l.is_none()).count();
        if unparsable > 0 {
            caveats.push(format!("{unparsable} unparsable date value(s) treated as null"));
        }
        let distinct_layouts: BTreeSet<usize> = layouts.iter().flatten().map(|(idx, _)| *idx).collect();
        if distinct_layouts.len() > 1 {
            caveats.push(format!("{} different date layouts observed", distinct_layouts.len()));
        }
        let iso = layouts.iter().flatten().all(|(_, iso)| *iso);

        let valid: Vec<String> = rendered
            .into_iter()
            .zip(layouts)
            .filter_map(|(text, layout)| layout.map(|_| text))
            .collect();
        let consistent = unparsable == 0 && distinct_layouts.len() == 1;
        self.finish(column, DType::Datetime, valid, None, consistent, iso, caveats)
    }

    /// Shared tail: cardinality, categories, text lengths and confidence flags.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        column: &ColumnSample,
        dtype: DType,
        rendered: Vec<String>,
        numeric: Option<NumericSummary>,
        consistent_format: bool,
        iso_datetime: bool,
        mut caveats: Vec<String>,
    ) -> ColumnStatistics {
        let total = column.len();
        let count = rendered.len();

        let mut frequencies: BTreeMap<&str, usize> = BTreeMap::new();
        for value in &rendered {
            *frequencies.entry(value.as_str()).or_default() += 1;
        }
        let cardinality = frequencies.len();

        let mut mode: Option<(&str, usize)> = None;
        for (&value, &freq) in &frequencies {
            match mode {
                Some((_, best)) if freq <= best => {}
                _ => mode = Some((value, freq)),
            }
        }
        let limit = self.profiling.category_observation_limit;
        let categorical = CategoricalSummary {
            observed_categories: frequencies.keys().take(limit).map(|v| v.to_string()).collect(),
            truncated: cardinality > limit,
            mode: mode.map(|(value, _)| value.to_string()),
        };

        let text = matches!(dtype, DType::Categorical | DType::Identifier | DType::Text).then(|| {
            TextSummary {
                min_length: rendered.iter().map(|s| s.chars().count()).min().unwrap_or(0),
                max_length: rendered.iter().map(|s| s.chars().count()).max().unwrap_or(0),
                all_digits: rendered.iter().all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())),
                all_word_chars: rendered.iter().all(|s| {
                    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                }),
            }
        });

        let low_confidence = count < self.profiling.min_sample_size;
        if low_confidence {
            caveats.push(format!(
                "only {count} valid value(s); minimum viable sample is {}",
                self.profiling.min_sample_size
            ));
        }
        let spread_unusable = numeric.as_ref().is_some_and(|n| !n.has_usable_spread());
        let robust_fallback_used = low_confidence || spread_unusable;

        ColumnStatistics {
            name: column.name.clone(),
            total,
            count,
            null_rate: (total - count) as f64 / total as f64,
            cardinality,
            dtype_guess: dtype,
            consistent_format,
            robust_fallback_used,
            low_confidence,
            numeric,
            categorical: Some(categorical),
            text,
            iso_datetime,
            caveats,
        }
    }
}
