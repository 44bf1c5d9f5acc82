//! Validate and estimate presentation.

use crate::cost::CostEstimate;
use crate::error::ValidationError;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{Cell, CellAlignment, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::Path;

pub fn format_validation_text(file: &Path, errors: &[ValidationError]) -> String {
    if errors.is_empty() {
        return format!("{} {} is valid", "✓".green(), file.display());
    }
    let mut out = format!(
        "{} {} has {} problem(s):",
        "✗".red(),
        file.display(),
        errors.len()
    );
    for error in errors {
        out.push_str(&format!("\n  - {}", error));
    }
    out
}

pub fn format_validation_json(file: &Path, errors: &[ValidationError]) -> String {
    let out = json!({
        "file": file.display().to_string(),
        "valid": errors.is_empty(),
        "errors": errors
            .iter()
            .map(|e| json!({ "step_id": e.step_id(), "message": e.to_string(), "detail": e }))
            .collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

/// Per-step table with a total row. Approximate lines are marked `~`.
pub fn format_estimate_text(estimate: &CostEstimate) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Step", "Group", "Model", "Provider", "Cost"]);
    for line in &estimate.lines {
        let cost = if line.approximate {
            format!("~{}", line.cost)
        } else {
            line.cost.to_string()
        };
        table.add_row(vec![
            Cell::new(&line.step_id),
            Cell::new(line.group.as_deref().unwrap_or("-")),
            Cell::new(&line.model),
            Cell::new(line.provider),
            Cell::new(cost).set_alignment(CellAlignment::Right),
        ]);
    }

    let mut out = format!("{}\n{}\n", format!("Estimate: {}", estimate.pipeline).bold(), table);
    out.push_str(&format!("Total: {}", estimate.total.to_string().bold()));
    if estimate.is_approximate() {
        out.push_str(&format!(
            "\n{}",
            "~ some inputs are only known at run time; assumed values were used".dimmed()
        ));
    }
    out
}

pub fn format_estimate_json(estimate: &CostEstimate) -> String {
    let mut value = serde_json::to_value(estimate).unwrap_or_else(|_| json!({}));
    value["approximate"] = json!(estimate.is_approximate());
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}
