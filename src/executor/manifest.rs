//! Result files under `<output_dir>/<run_id>/`.

use crate::executor::report::{RunReport, StepResult};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Serialize)]
struct IntermediateRecord<'a> {
    #[serde(flatten)]
    result: &'a StepResult,
    response: &'a Value,
}

/// Write one completed step and the provider response it came from.
pub fn write_step(run_dir: &Path, result: &StepResult, response: &Value) -> io::Result<PathBuf> {
    let path = run_dir.join(format!("{}.json", result.step_id));
    write_json(&path, &IntermediateRecord { result, response })?;
    Ok(path)
}

pub fn write_manifest(run_dir: &Path, report: &RunReport) -> io::Result<PathBuf> {
    let path = run_dir.join(MANIFEST_FILE);
    write_json(&path, report)?;
    Ok(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    fs::write(path, bytes)
}
