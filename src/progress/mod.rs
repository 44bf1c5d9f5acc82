//! Progress reporting for pipeline runs.

pub mod event;
pub mod sink;

pub use event::{now_millis, ProgressEnvelope, ProgressEvent};
pub use sink::{ChannelSink, CollectingSink, JsonLinesSink, NullSink, ProgressSink};
