//! Run-report rendering
//!
//! Turns a `PipelineReport` into a colored terminal summary and pretty
//! JSON, for the CLI and for saving next to analysis outputs.

use anyhow::Result;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::Path;

use crate::core::PipelineReport;

/// Rendered views of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: String,
    pub json: String,
}

impl RunReport {
    pub fn new(report: &PipelineReport) -> Self {
        Self {
            summary: generate_summary(report),
            json: serde_json::to_string_pretty(report).unwrap_or_default(),
        }
    }

    pub fn print_summary(&self) {
        println!("{}", self.summary);
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.json)?;
        Ok(())
    }
}

fn generate_summary(report: &PipelineReport) -> String {
    let mut out = String::new();
    let rule = "═".repeat(52);

    let _ = writeln!(out, "{}", rule.bright_cyan());
    let _ = writeln!(
        out,
        "  eDNA ANALYSIS :: sample {}",
        report.sample_id.bright_white()
    );
    let _ = writeln!(out, "{}", rule.bright_cyan());

    if let Some(quality) = &report.quality {
        let _ = writeln!(out, "\n{}", "📊 Quality filtering".bright_yellow());
        let _ = writeln!(out, "  Input reads:   {}", quality.total_reads);
        let _ = writeln!(
            out,
            "  Passed:        {} | Failed: {}",
            quality.passed_count.to_string().bright_green(),
            quality.failed_count.to_string().bright_red()
        );
        let _ = writeln!(
            out,
            "  Passed means:  {:.1} bp, Q{:.1}",
            quality.mean_length_passed, quality.mean_quality_passed
        );
    }

    if let Some(clustering) = &report.clustering {
        let _ = writeln!(out, "\n{}", "🧩 ASV clustering".bright_yellow());
        let _ = writeln!(
            out,
            "  ASVs: {} ({} singletons) from {} sequences",
            clustering.total_asvs, clustering.singletons, clustering.total_sequences
        );
        let _ = writeln!(
            out,
            "  Mean cluster size: {:.2}",
            clustering.stats.mean_cluster_size
        );
    }

    if let Some(taxonomy) = &report.taxonomy {
        let _ = writeln!(out, "\n{}", "🏷️  Taxonomy".bright_yellow());
        let _ = writeln!(
            out,
            "  Assigned: {} | Unassigned: {} | Mean confidence: {:.2}",
            taxonomy.assigned_count, taxonomy.unassigned_count, taxonomy.average_confidence
        );
    }

    if let Some(diversity) = &report.diversity {
        let _ = writeln!(out, "\n{}", "🌿 Diversity".bright_yellow());
        let _ = writeln!(
            out,
            "  Shannon: {:.3} | Simpson: {:.3} | Chao1: {:.1}",
            diversity.shannon, diversity.simpson, diversity.chao1
        );
        let evenness = diversity
            .evenness
            .map_or("n/a".to_string(), |e| format!("{e:.3}"));
        let _ = writeln!(
            out,
            "  Richness: {} | Evenness: {}",
            diversity.observed_richness, evenness
        );
    }

    if let Some(contamination) = &report.contamination {
        let verdict = if contamination.is_clean {
            "CLEAN".bright_green()
        } else {
            "CONTAMINATED".bright_red()
        };
        let _ = writeln!(out, "\n{}", "🧪 Contamination".bright_yellow());
        let _ = writeln!(
            out,
            "  Score: {:.3} → {} ({} flagged ASVs)",
            contamination.contamination_score,
            verdict,
            contamination.flagged_asvs.len()
        );
    }

    if !report.top_species.is_empty() {
        let _ = writeln!(out, "\n{}", "🏆 Top taxa".bright_yellow());
        for entry in &report.top_species {
            let _ = writeln!(out, "  {:>8}  {}", entry.count, entry.name);
        }
    }

    match (&report.failed_stage, &report.failure) {
        (Some(stage), Some(message)) => {
            let _ = writeln!(
                out,
                "\n{} {}: {}",
                "⚠️  halted at".bright_red(),
                stage.to_string().bright_white(),
                message
            );
        }
        _ => {
            let _ = writeln!(
                out,
                "\n{} in {:.2}s",
                "✅ completed".bright_green(),
                report.elapsed.as_secs_f64()
            );
        }
    }

    out
}
