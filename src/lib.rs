//! govinfer - Data-governance policy inference for tabular samples
//!
//! govinfer takes a data sample (possibly dirty, small or skewed) and an
//! optional, possibly incomplete data dictionary, and infers a structured
//! governance policy: per-field metadata plus a bounded set of executable
//! validation rules, each with a justification and a score.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          PolicyEngine                             │
//! │                                                                   │
//! │   Dataset + DataDictionary                                        │
//! │        │                                                          │
//! │        ▼                                                          │
//! │  ┌───────────┐   ┌──────────────────────┐   ┌─────────────────┐   │
//! │  │ Profiler  │──►│ Role / Sensitivity   │──►│ Rule Synthesizer│   │
//! │  │ (rayon)   │   │ Classifiers (rayon)  │   │ (rayon)         │   │
//! │  └───────────┘   └──────────────────────┘   └────────┬────────┘   │
//! │                                                      │ barrier    │
//! │                                       ┌──────────────▼────────┐   │
//! │                                       │ Consistency patterns  │   │
//! │                                       └──────────────┬────────┘   │
//! │  ┌───────────┐   ┌──────────────────────┐   ┌────────▼────────┐   │
//! │  │ Assembler │◄──│ Refiner              │◄──│ Conflict        │   │
//! │  │           │   │ dedup / rank / budget│   │ Resolver        │   │
//! │  └─────┬─────┘   └──────────────────────┘   └─────────────────┘   │
//! └────────┼──────────────────────────────────────────────────────────┘
//!          ▼
//!       Policy (JSON / YAML)
//! ```
//!
//! ## Modules
//!
//! - [`profile`]: Sample model and per-column statistics
//! - [`classify`]: Role, type and sensitivity classification with provenance
//! - [`rules`]: Rule synthesis, conflict resolution and refinement
//! - [`policy`]: Policy document and assembly
//! - [`dictionary`]: Optional declared column metadata
//! - [`engine`]: The staged pipeline
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use govinfer::{ColumnSample, Dataset, EngineConfig, PolicyEngine};
//!
//! let dataset = Dataset::new(vec![
//!     ColumnSample::new("age", vec![23_i64, 35, 41, 58]),
//!     ColumnSample::new("segment", vec!["retail", "retail", "business", "retail"]),
//! ])?;
//! let engine = PolicyEngine::new(EngineConfig::default())?;
//! let policy = engine.infer(&dataset, None)?;
//! println!("{}", policy.to_json()?);
//! # Ok::<(), govinfer::Error>(())
//! ```

pub mod classify;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod policy;
pub mod profile;
pub mod rules;

pub use config::EngineConfig;
pub use dictionary::{DataDictionary, DictionaryEntry};
pub use engine::PolicyEngine;
pub use error::{Error, Result};
pub use policy::Policy;
pub use profile::{ColumnSample, Dataset, RawValue};
