//! CLI domain: parse, route, terminal rendering and presentation only.
//! Orchestration lives in [`crate::engine::Engine`].

mod output;
mod parse;
mod presentation;
mod route;
mod terminal;

pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands};
pub use presentation::{
    format_config_text, format_estimate_json, format_estimate_text, format_models_json,
    format_models_text, format_report_text, format_validation_json, format_validation_text,
};
pub use route::{CommandOutput, RunContext};
pub use terminal::{DialoguerGate, LineRenderer};
