//! CLI output: error mapping from engine errors to the stable CLI surface.

use crate::error::EngineError;

/// Map engine errors to text for stderr. Validation lists get one line per problem.
pub fn map_error(e: &EngineError) -> String {
    match e {
        EngineError::Validation(errors) => {
            let mut out = e.to_string();
            for error in errors {
                out.push_str(&format!("\n  - {}", error));
            }
            out
        }
        other => other.to_string(),
    }
}
