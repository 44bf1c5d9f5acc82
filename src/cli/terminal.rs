//! Interactive terminal pieces: the single-line progress renderer and the
//! cost confirmation prompt.

use crate::cli::presentation::format_estimate_text;
use crate::cost::CostEstimate;
use crate::executor::ConfirmationGate;
use crate::progress::{ProgressEnvelope, ProgressEvent, ProgressSink};
use async_trait::async_trait;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::io::Write;

/// Renders progress on stderr: one updating status line, with a permanent
/// line per finished or failed step.
pub struct LineRenderer<W: Write + Send = std::io::Stderr> {
    out: Mutex<LineState<W>>,
}

struct LineState<W> {
    writer: W,
    /// A status line is on screen and must be cleared before the next write.
    pending: bool,
}

impl LineRenderer<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> LineRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: Mutex::new(LineState {
                writer,
                pending: false,
            }),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().writer
    }

    fn render(&self, event: &ProgressEvent) -> std::io::Result<()> {
        let mut state = self.out.lock();
        if state.pending {
            write!(state.writer, "\r\x1b[2K")?;
            state.pending = false;
        }
        match event {
            ProgressEvent::Start {
                pipeline,
                total_steps,
                estimated_cost,
            } => writeln!(
                state.writer,
                "{} {} ({} step(s), estimated {})",
                "▶".cyan(),
                pipeline.bold(),
                total_steps,
                estimated_cost
            )?,
            ProgressEvent::Progress { percent, message } => {
                write!(state.writer, "[{:>3}%] {}", percent, message)?;
                state.pending = true;
            }
            ProgressEvent::StepComplete {
                step_id,
                cost,
                duration_ms,
            } => writeln!(
                state.writer,
                "{} {} {} in {:.1}s",
                "✓".green(),
                step_id,
                cost,
                *duration_ms as f64 / 1000.0
            )?,
            ProgressEvent::Error { step_id, cause } => writeln!(
                state.writer,
                "{} {}: {}",
                "✗".red(),
                step_id.as_deref().unwrap_or("run"),
                cause
            )?,
            ProgressEvent::Complete { result } => writeln!(
                state.writer,
                "{} {} in {:.1}s, cost {}",
                "■".dimmed(),
                result.status,
                result.duration_ms as f64 / 1000.0,
                result.total_cost
            )?,
        }
        state.writer.flush()
    }
}

impl<W: Write + Send> ProgressSink for LineRenderer<W> {
    fn emit(&self, envelope: &ProgressEnvelope) {
        if let Err(e) = self.render(&envelope.event) {
            tracing::debug!(error = %e, "Failed to render progress");
        }
    }
}

/// Shows the estimate table and asks on the terminal before spending.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerGate;

#[async_trait]
impl ConfirmationGate for DialoguerGate {
    async fn confirm(&self, estimate: &CostEstimate) -> bool {
        let table = format_estimate_text(estimate);
        let prompt = format!("Run '{}' for about {}?", estimate.pipeline, estimate.total);
        let answer = tokio::task::spawn_blocking(move || {
            eprintln!("{}", table);
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await;
        match answer {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to read confirmation");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Confirmation prompt aborted");
                false
            }
        }
    }
}
