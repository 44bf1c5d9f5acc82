//! CLI presentation: text and json formatters per command family.

mod catalog;
mod pipeline;
mod report;

pub use catalog::{format_config_text, format_models_json, format_models_text};
pub use pipeline::{
    format_estimate_json, format_estimate_text, format_validation_json, format_validation_text,
};
pub use report::format_report_text;
