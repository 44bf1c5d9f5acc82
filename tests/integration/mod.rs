//! Integration tests for the aicp pipeline engine

mod caller;
mod config_integration;
mod executor;
mod http_transport;
mod parser;
mod test_utils;
