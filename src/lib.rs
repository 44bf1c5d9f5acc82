//! aicp: AI content-generation pipeline engine.
//!
//! Parses declarative pipeline documents against a catalog of generative
//! models, prices them before anything is spent, and runs them against remote
//! providers with credential rotation, retries and bounded parallelism.

pub mod artifact;
pub mod cancel;
pub mod chain;
pub mod cli;
pub mod config;
pub mod cost;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod progress;
pub mod provider;
pub mod registry;

pub use engine::{Engine, RunHandle};
pub use error::EngineError;
