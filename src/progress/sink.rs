//! Progress sinks. Emission is best effort: a sink never fails the run.

use crate::progress::event::ProgressEnvelope;
use parking_lot::Mutex;
use std::io::Write;
use tokio::sync::mpsc;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, envelope: &ProgressEnvelope);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _envelope: &ProgressEnvelope) {}
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ProgressSink for JsonLinesSink<W> {
    fn emit(&self, envelope: &ProgressEnvelope) {
        let line = match serde_json::to_string(envelope) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize progress event");
                return;
            }
        };
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::warn!(error = %e, "Failed to write progress event");
        }
    }
}

/// Forwards events to an unbounded channel; a closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEnvelope>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, envelope: &ProgressEnvelope) {
        let _ = self.tx.send(envelope.clone());
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEnvelope>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEnvelope> {
        self.events.lock().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, envelope: &ProgressEnvelope) {
        self.events.lock().push(envelope.clone());
    }
}
