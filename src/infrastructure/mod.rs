//! Infrastructure layer
//!
//! Adapters for the domain ports plus process-level concerns:
//! - `canonical`: canonical state service clients
//! - `bridge`: event bridge transports
//! - `navigation`: navigation sinks
//! - `config`: figment-based configuration loading
//! - `logging`: tracing subscriber setup

pub mod bridge;
pub mod canonical;
pub mod config;
pub mod logging;
pub mod navigation;
