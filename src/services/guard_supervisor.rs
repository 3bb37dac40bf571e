//! One route guard per (engagement, observer), wired to the event bridge.
//!
//! The supervisor mounts guards, forwards each engagement's bridge stream to
//! its guard in delivery order, and falls back to periodic resyncs against
//! the canonical service while the bridge is lagging or disconnected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::errors::GuardResult;
use crate::domain::models::{
    Baseline, EngagementId, ObserverId, ReconciliationConfig, Route,
};
use crate::domain::ports::{
    BridgeMessage, CanonicalStateService, EventBridge, EventSubscription, NavigationSink,
};
use crate::services::guard_actor::{spawn_route_guard, RouteGuardHandle};
use crate::services::route_guard::{GuardOutcome, RouteGuard};
use crate::services::route_table::RouteTable;

/// Key of a mounted guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuardKey {
    /// Engagement the guard watches
    pub engagement_id: EngagementId,
    /// Client the guard serves
    pub observer_id: ObserverId,
}

/// Everything needed to mount a guard for one observing client.
pub struct MountRequest {
    /// Engagement to guard
    pub engagement_id: EngagementId,
    /// Observing client
    pub observer_id: ObserverId,
    /// Route the client is displaying
    pub current_route: Route,
    /// Baseline supplied with the page; fetched when absent
    pub baseline: Option<Baseline>,
    /// Where route replacements go
    pub navigator: Arc<dyn NavigationSink>,
}

impl MountRequest {
    /// Request with a fresh observer id and no baseline.
    pub fn new(
        engagement_id: EngagementId,
        current_route: Route,
        navigator: Arc<dyn NavigationSink>,
    ) -> Self {
        Self {
            engagement_id,
            observer_id: ObserverId::new(),
            current_route,
            baseline: None,
            navigator,
        }
    }

    /// Use a specific observer id.
    pub fn with_observer(mut self, observer_id: ObserverId) -> Self {
        self.observer_id = observer_id;
        self
    }

    /// Supply the baseline instead of fetching it.
    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = Some(baseline);
        self
    }
}

/// Result of a successful mount.
pub struct Mounted {
    /// Handle to the running guard
    pub handle: RouteGuardHandle,
    /// Result of the initial route check
    pub outcome: GuardOutcome,
}

struct MountedGuard {
    handle: RouteGuardHandle,
    actor: JoinHandle<()>,
    pump: JoinHandle<()>,
}

/// Registry and wiring for route guards.
pub struct GuardSupervisor {
    canonical: Arc<dyn CanonicalStateService>,
    bridge: Option<Arc<dyn EventBridge>>,
    routes: RouteTable,
    config: ReconciliationConfig,
    guards: RwLock<HashMap<GuardKey, MountedGuard>>,
}

impl GuardSupervisor {
    /// Create a new instance.
    pub fn new(
        canonical: Arc<dyn CanonicalStateService>,
        routes: RouteTable,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            canonical,
            bridge: None,
            routes,
            config,
            guards: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a push transport. Without one, guards run on polling only.
    pub fn with_bridge(mut self, bridge: Arc<dyn EventBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Mount a guard and validate the observer's current route.
    ///
    /// The bridge subscription is opened before the baseline is read so that
    /// nothing published in between is lost; replaying those events after the
    /// baseline is harmless.
    pub async fn mount(&self, request: MountRequest) -> GuardResult<Mounted> {
        let key = GuardKey {
            engagement_id: request.engagement_id.clone(),
            observer_id: request.observer_id,
        };
        if self.unmount(&key.engagement_id, key.observer_id).await {
            debug!(engagement_id = %key.engagement_id, "replaced existing guard");
        }

        let guard = RouteGuard::new(
            request.engagement_id.clone(),
            request.observer_id,
            self.routes.clone(),
            request.navigator,
        );
        let (handle, actor) =
            spawn_route_guard(guard, self.canonical.clone(), self.config.queue_capacity);

        let subscription = match self.bridge {
            Some(ref bridge) => match bridge.subscribe(&request.engagement_id).await {
                Ok(subscription) => Some(subscription),
                Err(err) => {
                    warn!(
                        engagement_id = %request.engagement_id,
                        error = %err,
                        "event bridge subscription failed, using reconciliation"
                    );
                    None
                }
            },
            None => None,
        };

        let outcome = match request.baseline {
            Some(baseline) => {
                handle
                    .initialize_with_baseline(baseline, request.current_route)
                    .await
            }
            None => handle.initialize(request.current_route).await,
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                actor.abort();
                return Err(err);
            }
        };

        let pump = tokio::spawn(pump_events(
            handle.clone(),
            self.bridge.clone(),
            subscription,
            self.config.clone(),
        ));

        info!(
            engagement_id = %key.engagement_id,
            observer_id = %key.observer_id,
            outcome = ?outcome,
            "route guard mounted"
        );

        self.guards.write().await.insert(
            key,
            MountedGuard {
                handle: handle.clone(),
                actor,
                pump,
            },
        );

        Ok(Mounted { handle, outcome })
    }

    /// Tear down a guard and cancel its subscription. Returns false if none
    /// was mounted.
    pub async fn unmount(&self, engagement_id: &EngagementId, observer_id: ObserverId) -> bool {
        let key = GuardKey {
            engagement_id: engagement_id.clone(),
            observer_id,
        };
        let Some(mounted) = self.guards.write().await.remove(&key) else {
            return false;
        };

        mounted.pump.abort();
        mounted.handle.shutdown().await;
        if let Err(err) = mounted.actor.await {
            if !err.is_cancelled() {
                warn!(engagement_id = %engagement_id, error = %err, "guard actor failed");
            }
        }
        info!(engagement_id = %engagement_id, observer_id = %observer_id, "route guard unmounted");
        true
    }

    /// Handle of a mounted guard.
    pub async fn handle(
        &self,
        engagement_id: &EngagementId,
        observer_id: ObserverId,
    ) -> Option<RouteGuardHandle> {
        let key = GuardKey {
            engagement_id: engagement_id.clone(),
            observer_id,
        };
        self.guards.read().await.get(&key).map(|m| m.handle.clone())
    }

    /// Number of mounted guards.
    pub async fn mounted_count(&self) -> usize {
        self.guards.read().await.len()
    }

    /// Unmount every guard.
    pub async fn shutdown(&self) {
        let keys: Vec<GuardKey> = self.guards.read().await.keys().cloned().collect();
        for key in keys {
            self.unmount(&key.engagement_id, key.observer_id).await;
        }
    }
}

/// Forward bridge events to a guard; reconcile by polling while disconnected.
async fn pump_events(
    handle: RouteGuardHandle,
    bridge: Option<Arc<dyn EventBridge>>,
    mut subscription: Option<Box<dyn EventSubscription>>,
    config: ReconciliationConfig,
) {
    let engagement_id = handle.engagement_id().clone();

    loop {
        if let Some(mut live) = subscription.take() {
            while let Some(message) = live.next().await {
                let sent = match message {
                    BridgeMessage::Event(event) => handle.submit(event).await,
                    BridgeMessage::Lagged(missed) => {
                        warn!(
                            engagement_id = %engagement_id,
                            missed,
                            "event bridge lagged, forcing resync"
                        );
                        handle.request_resync().await
                    }
                };
                if sent.is_err() {
                    return;
                }
            }
            warn!(
                engagement_id = %engagement_id,
                "event bridge disconnected, falling back to reconciliation"
            );
        }

        match reconcile_until_resubscribed(&handle, bridge.as_ref(), &config).await {
            Some(live) => subscription = Some(live),
            None => return,
        }
    }
}

/// Poll resyncs until a new subscription opens. `None` once the guard is gone.
async fn reconcile_until_resubscribed(
    handle: &RouteGuardHandle,
    bridge: Option<&Arc<dyn EventBridge>>,
    config: &ReconciliationConfig,
) -> Option<Box<dyn EventSubscription>> {
    let mut poll = interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut resubscribe = interval(Duration::from_millis(config.resubscribe_interval_ms.max(1)));
    resubscribe.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first resubscribe tick fires immediately; skip it so a bridge that
    // just dropped is not hammered.
    resubscribe.tick().await;

    loop {
        tokio::select! {
            _ = poll.tick() => {
                if handle.request_resync().await.is_err() {
                    return None;
                }
            }
            _ = resubscribe.tick(), if bridge.is_some() => {
                let bridge = bridge?;
                match bridge.subscribe(handle.engagement_id()).await {
                    Ok(live) => {
                        info!(engagement_id = %handle.engagement_id(), "event bridge reconnected");
                        // Catch up on whatever happened while disconnected.
                        if handle.request_resync().await.is_err() {
                            return None;
                        }
                        return Some(live);
                    }
                    Err(err) => {
                        debug!(
                            engagement_id = %handle.engagement_id(),
                            error = %err,
                            "event bridge still unavailable"
                        );
                    }
                }
            }
        }
    }
}
