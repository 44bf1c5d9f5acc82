//! Run report presentation.

use crate::executor::{RunReport, RunStatus};
use owo_colors::OwoColorize;

pub fn format_report_text(report: &RunReport) -> String {
    let status = match report.status {
        RunStatus::Completed => report.status.to_string().green().to_string(),
        RunStatus::Cancelled => report.status.to_string().yellow().to_string(),
        _ => report.status.to_string().red().to_string(),
    };
    let mut out = format!(
        "Run {} ({}): {}\n  cost: {} (estimated {})\n  duration: {:.1}s",
        report.run_id,
        report.pipeline,
        status,
        report.total_cost,
        report.estimated_cost,
        report.duration_ms as f64 / 1000.0
    );
    if let (Some(step), Some(cause)) = (&report.failed_step_id, &report.cause) {
        out.push_str(&format!("\n  failed step: {} ({})", step.bold(), cause));
    }
    if !report.outputs.is_empty() {
        out.push_str("\n  outputs:");
        for (step_id, artifact) in &report.outputs {
            out.push_str(&format!("\n    {}: {}", step_id, artifact.interpolation_text()));
        }
    }
    if let Some(manifest) = &report.manifest {
        out.push_str(&format!("\n  manifest: {}", manifest.display()));
    }
    out
}
