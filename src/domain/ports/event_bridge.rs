//! Port to the push transport for quote changes.

use async_trait::async_trait;

use crate::domain::models::{EngagementId, QuoteEventDto};
use crate::domain::ports::errors::BridgeError;

/// Item yielded by a live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeMessage {
    /// A raw change notification, in delivery order
    Event(QuoteEventDto),
    /// The subscriber fell behind and this many events were lost
    Lagged(u64),
}

/// Ordered stream of change notifications for one engagement.
///
/// Dropping the subscription cancels it.
#[async_trait]
pub trait EventSubscription: Send {
    /// Next message, or `None` once the transport has disconnected
    async fn next(&mut self) -> Option<BridgeMessage>;
}

/// Push-notification transport scoped per engagement.
///
/// Delivery is at-least-once and strictly ordered within one engagement.
#[async_trait]
pub trait EventBridge: Send + Sync {
    /// Open an ordered subscription for one engagement
    async fn subscribe(
        &self,
        engagement_id: &EngagementId,
    ) -> Result<Box<dyn EventSubscription>, BridgeError>;
}
