use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use edna_forge::diversity::{DiversityCalculator, RarefactionConfig};
use edna_forge::qc::{QualityFilter, QualityFilterConfig};
use edna_forge::reporting::RunReport;
use edna_forge::taxonomy::{InMemoryReference, Lineage};
use edna_forge::{PipelineOptions, PipelineOrchestrator, Read, SampleAbundance};

#[derive(Parser)]
#[command(name = "edna-forge", about = "eDNA metabarcoding analysis pipeline")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a JSON read batch
    Analyze {
        /// JSON file: array of {id, sequence, quality?}
        input: PathBuf,

        /// Sample identifier (defaults to the input file stem)
        #[arg(short, long)]
        sample_name: Option<String>,

        /// JSON reference database: array of {id, sequence, taxonomy}
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Write the full JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overall pipeline timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Quality-filter a read batch and print the metrics
    Quality {
        /// JSON file: array of {id, sequence, quality?}
        input: PathBuf,
    },

    /// Alpha/beta diversity and rarefaction over sample abundance maps
    Diversity {
        /// JSON file: {sampleId: {taxon: count}}
        input: PathBuf,

        /// Rarefaction depth steps
        #[arg(long, default_value_t = 20)]
        steps: usize,

        /// Rarefaction iterations per depth
        #[arg(long, default_value_t = 10)]
        iterations: usize,

        /// Rarefaction RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

/// One reference database row in the JSON input.
#[derive(Deserialize)]
struct ReferenceRow {
    id: String,
    sequence: String,
    /// Semicolon-delimited lineage, kingdom first.
    taxonomy: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .init();

    match cli.command {
        Commands::Analyze {
            input,
            sample_name,
            reference,
            output,
            timeout_secs,
        } => {
            let sample_name = sample_name.unwrap_or_else(|| {
                input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("sample")
                    .to_string()
            });

            let reads = load_reads(&input)?;
            let source = load_reference(reference.as_deref())?;
            let orchestrator = PipelineOrchestrator::new(Arc::new(source));

            let options = PipelineOptions {
                overall_timeout: timeout_secs.map(Duration::from_secs),
                ..Default::default()
            };
            let report = orchestrator.run(&reads, &sample_name, &options).await?;

            let rendered = RunReport::new(&report);
            rendered.print_summary();
            if let Some(path) = output {
                rendered
                    .save_json(&path)
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
            }
        }

        Commands::Quality { input } => {
            let reads = load_reads(&input)?;
            let outcome = QualityFilter::new().filter(&reads, &QualityFilterConfig::default());
            println!("{}", serde_json::to_string_pretty(&outcome.metrics)?);
        }

        Commands::Diversity {
            input,
            steps,
            iterations,
            seed,
        } => {
            let samples = load_samples(&input)?;
            let calculator = DiversityCalculator::new();

            let mut sample_ids: Vec<&String> = samples.keys().collect();
            sample_ids.sort();
            let alpha: Vec<_> = sample_ids
                .iter()
                .map(|id| calculator.alpha(id, &samples[*id]))
                .collect();
            let beta = calculator.beta_matrix(&samples);
            let curves = calculator.rarefaction_curves(
                &samples,
                &RarefactionConfig {
                    steps,
                    iterations,
                    seed,
                },
            );

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "alpha": alpha,
                    "beta": beta,
                    "curves": curves,
                }))?
            );
        }
    }

    Ok(())
}

fn load_reads(path: &std::path::Path) -> Result<Vec<Read>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid read batch in {}", path.display()))
}

fn load_samples(path: &std::path::Path) -> Result<ahash::AHashMap<String, SampleAbundance>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid sample abundance map in {}", path.display()))
}

/// Build the in-memory reference source; an absent file yields an empty
/// reference, so every ASV simply comes back unassigned.
fn load_reference(path: Option<&std::path::Path>) -> Result<InMemoryReference> {
    let mut reference = InMemoryReference::new(8);
    let Some(path) = path else {
        return Ok(reference);
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let rows: Vec<ReferenceRow> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid reference database in {}", path.display()))?;
    for row in rows {
        reference.add_entry(
            row.id,
            &row.sequence,
            Lineage::from_taxonomy_string(&row.taxonomy),
        );
    }
    Ok(reference)
}
