//! Port trait definitions (Hexagonal Architecture)
//!
//! - CanonicalStateService: authoritative route-state reads
//! - EventBridge: per-engagement push notifications
//! - NavigationSink: client route replacement

pub mod canonical_state;
pub mod errors;
pub mod event_bridge;
pub mod navigation;

pub use canonical_state::CanonicalStateService;
pub use errors::{BridgeError, CanonicalStateError};
pub use event_bridge::{BridgeMessage, EventBridge, EventSubscription};
pub use navigation::NavigationSink;
