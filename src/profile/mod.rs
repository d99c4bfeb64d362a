//! Sample profiling
//!
//! Turns raw column samples into per-column statistics with robust
//! fallback flags. Includes:
//! - Input model and validation ([`Dataset`], [`ColumnSample`])
//! - Per-column statistics ([`ColumnStatistics`])
//! - The parallel column profiler ([`Profiler`])
//! - Sample-size recommendation (Cochran)

pub mod profiler;
pub mod sample;
pub mod sampling;
pub mod stats;

pub use profiler::Profiler;
pub use sample::{ColumnSample, Dataset, RawValue};
pub use sampling::recommended_sample_size;
pub use stats::{CategoricalSummary, ColumnStatistics, DType, NumericSummary, TextSummary};
