//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output
//! - Optional daily-rolling JSON log files

pub mod logger;

pub use logger::LoggerImpl;
