//! govinfer - Data-governance policy inference for tabular samples
//!
//! Thin command-line wrapper: reads a sample and an optional dictionary,
//! runs the engine, and writes the policy as JSON or YAML.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use govinfer::{
    profile::recommended_sample_size, DataDictionary, Dataset, EngineConfig, PolicyEngine,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "govinfer")]
#[command(version)]
#[command(about = "Infer data-governance policies from tabular samples")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GOVINFER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer a policy from a sample
    Infer {
        /// Sample file (JSON: {"columns": [{"name": ..., "values": [...]}]})
        #[arg(short, long)]
        sample: PathBuf,

        /// Data dictionary (YAML or JSON)
        #[arg(short, long)]
        dictionary: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,

        /// Write the policy here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },

    /// Recommend a sample size for a population
    SampleSize {
        /// Population size
        #[arg(short, long)]
        population: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the policy
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("govinfer={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Infer {
            sample,
            dictionary,
            format,
            output,
        } => {
            run_infer(config, &sample, dictionary.as_deref(), format, output.as_deref())?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
        Commands::SampleSize { population } => {
            let sampling = &config.sampling;
            let n = recommended_sample_size(
                population,
                sampling.confidence_level,
                sampling.margin_error,
                sampling.estimated_p,
            )?;
            println!("{}", n);
        }
    }

    Ok(())
}

fn run_infer(
    config: EngineConfig,
    sample: &Path,
    dictionary: Option<&Path>,
    format: Format,
    output: Option<&Path>,
) -> Result<()> {
    let content = std::fs::read_to_string(sample)
        .with_context(|| format!("reading sample {}", sample.display()))?;
    let dataset: Dataset = serde_json::from_str(&content)
        .with_context(|| format!("parsing sample {}", sample.display()))?;

    let dictionary = dictionary
        .map(|path| {
            DataDictionary::from_file(path)
                .with_context(|| format!("loading dictionary {}", path.display()))
        })
        .transpose()?;

    let engine = PolicyEngine::new(config)?;
    let policy = engine.infer(&dataset, dictionary.as_ref())?;

    let rendered = match format {
        Format::Json => policy.to_json()?,
        Format::Yaml => policy.to_yaml()?,
    };
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("writing policy to {}", path.display()))?;
            tracing::info!(path = %path.display(), rules = policy.rules().len(), "Policy written");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn show_config(config: Option<&EngineConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
