//! Stagegate - stage-aware route guarding for engagement clients
//!
//! An engagement moves through stages (pending, negotiating, closing, post
//! approval) driven by the statuses of its quotes. Stagegate keeps each
//! observing client on the route for the current stage: it validates the
//! route before first paint, follows pushed quote changes, and issues a
//! single route replacement when the stage moves.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, wire shapes, ports and errors
//! - **Service Layer** (`services`): stage resolution, shadow state, route guards
//! - **Infrastructure Layer** (`infrastructure`): HTTP client, event bridge,
//!   navigation sinks, config and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{GuardError, MalformedEvent};
pub use domain::models::{
    Baseline, CanonicalStatus, Config, EngagementId, ObserverId, Quote, QuoteId, QuotePatch,
    Route, RouteTarget, Stage,
};
pub use domain::ports::{CanonicalStateService, EventBridge, NavigationSink};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    GuardOutcome, GuardPhase, GuardStatus, GuardSupervisor, MountRequest, RouteGuard,
    RouteGuardHandle, RouteTable,
};
