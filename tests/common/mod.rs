//! Common test utilities for integration tests
//!
//! Fixtures for wiring a supervisor to in-memory collaborators, plus builders
//! for wire-format quotes and events.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use stagegate::domain::models::{
    EngagementId, ObserverId, QuoteDto, QuoteEventDto, ReconciliationConfig, Route,
};
use stagegate::infrastructure::bridge::InMemoryEventBridge;
use stagegate::infrastructure::canonical::InMemoryCanonicalState;
use stagegate::infrastructure::navigation::RecordingNavigator;
use stagegate::services::guard_supervisor::{GuardSupervisor, MountRequest, Mounted};
use stagegate::services::route_guard::GuardStatus;
use stagegate::services::route_table::RouteTable;

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll `predicate` every 10ms until it holds or `timeout_ms` elapses.
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    predicate()
}

/// Reconciliation settings fast enough for tests.
pub fn fast_reconciliation() -> ReconciliationConfig {
    ReconciliationConfig {
        poll_interval_ms: 25,
        resubscribe_interval_ms: 25,
        queue_capacity: 64,
    }
}

pub fn quote(id: &str, status: &str) -> QuoteDto {
    QuoteDto {
        id: id.to_string(),
        status: status.to_string(),
        selected_by_counterpart: false,
        visible_to_counterpart: true,
        linked_resource_id: None,
    }
}

pub fn update(id: &str, attributes: serde_json::Value) -> QuoteEventDto {
    event(id, "update", attributes)
}

pub fn insert(id: &str, attributes: serde_json::Value) -> QuoteEventDto {
    event(id, "insert", attributes)
}

pub fn delete(id: &str) -> QuoteEventDto {
    event(id, "delete", json!({}))
}

fn event(id: &str, change_type: &str, attributes: serde_json::Value) -> QuoteEventDto {
    serde_json::from_value(json!({
        "quote_id": id,
        "change_type": change_type,
        "attributes": attributes,
    }))
    .expect("valid event fixture")
}

/// One engagement observed by one client, wired to in-memory collaborators.
pub struct Harness {
    pub engagement: EngagementId,
    pub observer: ObserverId,
    pub canonical: Arc<InMemoryCanonicalState>,
    pub bridge: Arc<InMemoryEventBridge>,
    pub navigator: Arc<RecordingNavigator>,
    pub supervisor: GuardSupervisor,
}

impl Harness {
    pub fn new(engagement: &str, quotes: Vec<QuoteDto>) -> Self {
        Self::with_bridge(engagement, quotes, InMemoryEventBridge::default())
    }

    /// Harness whose bridge keeps only `capacity` undelivered events.
    pub fn with_bridge_capacity(engagement: &str, quotes: Vec<QuoteDto>, capacity: usize) -> Self {
        Self::with_bridge(engagement, quotes, InMemoryEventBridge::new(capacity))
    }

    fn with_bridge(engagement: &str, quotes: Vec<QuoteDto>, bridge: InMemoryEventBridge) -> Self {
        let engagement = EngagementId::new(engagement);
        let canonical = Arc::new(InMemoryCanonicalState::new());
        canonical.set_quotes(&engagement, quotes);
        let bridge = Arc::new(bridge);
        let supervisor = GuardSupervisor::new(
            canonical.clone(),
            RouteTable::default(),
            fast_reconciliation(),
        )
        .with_bridge(bridge.clone());

        Self {
            engagement,
            observer: ObserverId::new(),
            canonical,
            bridge,
            navigator: Arc::new(RecordingNavigator::new()),
            supervisor,
        }
    }

    pub fn route(&self, suffix: &str) -> Route {
        Route::new(format!("/engagements/{}/{suffix}", self.engagement))
    }

    /// Mount (or re-mount) the observer on `route`, fetching the baseline.
    pub async fn mount_at(&self, route: Route) -> Mounted {
        self.supervisor
            .mount(
                MountRequest::new(self.engagement.clone(), route, self.navigator.clone())
                    .with_observer(self.observer),
            )
            .await
            .expect("mount")
    }

    pub async fn publish(&self, event: QuoteEventDto) {
        self.bridge.publish(&self.engagement, event).await;
    }

    pub async fn status(&self) -> GuardStatus {
        self.supervisor
            .handle(&self.engagement, self.observer)
            .await
            .expect("guard mounted")
            .status()
    }

    /// Wait until the guard has applied `count` events in total.
    pub async fn wait_for_events(&self, count: u64) -> bool {
        let handle = self
            .supervisor
            .handle(&self.engagement, self.observer)
            .await
            .expect("guard mounted");
        wait_for(|| handle.status().events_applied >= count, 2_000).await
    }

    pub async fn wait_for_navigations(&self, count: usize) -> bool {
        wait_for(|| self.navigator.routes().len() >= count, 2_000).await
    }
}
