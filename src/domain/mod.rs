//! Domain layer for the stage engine
//!
//! Quote and stage models, the ports to external collaborators, and the
//! error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{GuardError, MalformedEvent};
