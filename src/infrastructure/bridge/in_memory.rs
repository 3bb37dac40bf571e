//! In-process event bridge.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::domain::models::{EngagementId, QuoteEventDto};
use crate::domain::ports::{BridgeError, BridgeMessage, EventBridge, EventSubscription};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Event bridge backed by one tokio broadcast channel per engagement.
///
/// Subscribers that fall more than `capacity` events behind receive
/// `BridgeMessage::Lagged`. `disconnect` drops an engagement's channel so
/// every live subscription ends, which is how a transport outage looks to
/// the guards.
pub struct InMemoryEventBridge {
    channels: RwLock<HashMap<EngagementId, broadcast::Sender<QuoteEventDto>>>,
    capacity: usize,
    offline: AtomicBool,
}

impl Default for InMemoryEventBridge {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl InMemoryEventBridge {
    /// Bridge keeping at most `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            offline: AtomicBool::new(false),
        }
    }

    /// Publish to every subscriber of the engagement. Returns how many
    /// subscribers were reached.
    pub async fn publish(&self, engagement_id: &EngagementId, event: QuoteEventDto) -> usize {
        let channels = self.channels.read().await;
        match channels.get(engagement_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// End all subscriptions of an engagement.
    pub async fn disconnect(&self, engagement_id: &EngagementId) {
        if self.channels.write().await.remove(engagement_id).is_some() {
            debug!(engagement_id = %engagement_id, "event bridge channel dropped");
        }
    }

    /// While offline, new subscriptions are refused.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Live subscriptions for an engagement.
    pub async fn subscriber_count(&self, engagement_id: &EngagementId) -> usize {
        self.channels
            .read()
            .await
            .get(engagement_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

#[async_trait]
impl EventBridge for InMemoryEventBridge {
    async fn subscribe(
        &self,
        engagement_id: &EngagementId,
    ) -> Result<Box<dyn EventSubscription>, BridgeError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BridgeError::SubscribeFailed(
                engagement_id.clone(),
                "bridge offline".to_string(),
            ));
        }

        let mut channels = self.channels.write().await;
        let receiver = channels
            .entry(engagement_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        Ok(Box::new(BroadcastSubscription { receiver }))
    }
}

struct BroadcastSubscription {
    receiver: broadcast::Receiver<QuoteEventDto>,
}

#[async_trait]
impl EventSubscription for BroadcastSubscription {
    async fn next(&mut self) -> Option<BridgeMessage> {
        match self.receiver.recv().await {
            Ok(event) => Some(BridgeMessage::Event(event)),
            Err(broadcast::error::RecvError::Lagged(missed)) => Some(BridgeMessage::Lagged(missed)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
