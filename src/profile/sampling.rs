//! Sample-size recommendation
//!
//! Cochran's formula for estimating a proportion, with finite population
//! correction:
//!
//! ```text
//! n0 = z^2 * p * (1 - p) / e^2
//! n  = n0 / (1 + (n0 - 1) / N)
//! ```

use crate::error::{Error, Result};

/// Critical z-value for a two-sided confidence level.
pub fn z_value(confidence_level: f64) -> Result<f64> {
    const SUPPORTED: [(f64, f64); 3] = [(0.90, 1.645), (0.95, 1.96), (0.99, 2.576)];
    SUPPORTED
        .iter()
        .find(|(level, _)| (level - confidence_level).abs() < 1e-9)
        .map(|(_, z)| *z)
        .ok_or_else(|| {
            Error::Config(format!(
                "unsupported confidence level {confidence_level}; use 0.90, 0.95 or 0.99"
            ))
        })
}

/// Recommended number of rows to sample from a population of `population`.
pub fn recommended_sample_size(
    population: usize,
    confidence_level: f64,
    margin_error: f64,
    p: f64,
) -> Result<usize> {
    if population == 0 {
        return Err(Error::Input(
            "population total must be greater than zero".to_string(),
        ));
    }
    if !(margin_error > 0.0 && margin_error < 1.0) {
        return Err(Error::Config(format!(
            "margin of error must lie in (0, 1), got {margin_error}"
        )));
    }

    let z = z_value(confidence_level)?;
    let n0 = z * z * p * (1.0 - p) / (margin_error * margin_error);
    let n = n0 / (1.0 + (n0 - 1.0) / population as f64);
    let n = n.ceil().max(1.0) as usize;

    tracing::debug!(
        population,
        confidence_level,
        margin_error,
        p,
        recommended = n,
        "Computed sample size"
    );
    Ok(n.min(population))
}
