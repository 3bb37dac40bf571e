//! Domain models: quotes, stages, routes, wire shapes and configuration.

pub mod config;
pub mod engagement;
pub mod quote;
pub mod route_state;
pub mod stage;

pub use config::{
    CanonicalServiceConfig, Config, LoggingConfig, RateLimitConfig, ReconciliationConfig,
    RetryConfig, RoutesConfig,
};
pub use engagement::{Engagement, EngagementId, ObserverId};
pub use quote::{CanonicalStatus, Quote, QuoteId, QuotePatch, UnknownStatus};
pub use route_state::{
    Baseline, ChangeType, QuoteAttributesDto, QuoteChange, QuoteDto, QuoteEvent, QuoteEventDto,
    RouteStateDto,
};
pub use stage::{Route, RouteTarget, Stage};
