//! Serialized command queue around a [`RouteGuard`].
//!
//! Initial load, bridge events and reconciliation all arrive from independent
//! tasks. Each guard gets one consumer task that applies commands strictly in
//! arrival order, so merge, comparison and navigation happen atomically with
//! respect to one another. Different engagements run on different tasks and
//! never share state.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::errors::{GuardError, GuardResult};
use crate::domain::models::{
    Baseline, EngagementId, ObserverId, QuoteEventDto, QuoteId, QuotePatch, Route,
};
use crate::domain::ports::{CanonicalStateError, CanonicalStateService};
use crate::services::route_guard::{GuardOutcome, GuardStatus, RouteGuard};

enum GuardCommand {
    Initialize {
        baseline: Option<Baseline>,
        current_route: Route,
        reply: oneshot::Sender<GuardOutcome>,
    },
    Patch {
        quote_id: QuoteId,
        patch: QuotePatch,
        reply: oneshot::Sender<GuardOutcome>,
    },
    Event {
        event: QuoteEventDto,
        reply: Option<oneshot::Sender<GuardOutcome>>,
    },
    Resync {
        reply: Option<oneshot::Sender<GuardResult<GuardOutcome>>>,
    },
    Shutdown,
}

/// Cloneable handle to a running guard.
#[derive(Clone)]
pub struct RouteGuardHandle {
    engagement_id: EngagementId,
    observer_id: ObserverId,
    commands: mpsc::Sender<GuardCommand>,
    status: watch::Receiver<GuardStatus>,
}

impl RouteGuardHandle {
    /// Engagement this belongs to.
    pub fn engagement_id(&self) -> &EngagementId {
        &self.engagement_id
    }

    /// Observer this belongs to.
    pub fn observer_id(&self) -> ObserverId {
        self.observer_id
    }

    async fn send(&self, command: GuardCommand) -> GuardResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GuardError::Stopped)
    }

    /// Fetch the baseline from the canonical service and validate `current_route`.
    pub async fn initialize(&self, current_route: Route) -> GuardResult<GuardOutcome> {
        self.initialize_inner(None, current_route).await
    }

    /// Validate `current_route` against a baseline the caller already holds.
    pub async fn initialize_with_baseline(
        &self,
        baseline: Baseline,
        current_route: Route,
    ) -> GuardResult<GuardOutcome> {
        self.initialize_inner(Some(baseline), current_route).await
    }

    async fn initialize_inner(
        &self,
        baseline: Option<Baseline>,
        current_route: Route,
    ) -> GuardResult<GuardOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(GuardCommand::Initialize {
            baseline,
            current_route,
            reply,
        })
        .await?;
        rx.await.map_err(|_| GuardError::Stopped)
    }

    /// Merge a partial update for one quote and wait for the decision.
    pub async fn on_quote_event(
        &self,
        quote_id: QuoteId,
        patch: QuotePatch,
    ) -> GuardResult<GuardOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(GuardCommand::Patch {
            quote_id,
            patch,
            reply,
        })
        .await?;
        rx.await.map_err(|_| GuardError::Stopped)
    }

    /// Apply a raw bridge event and wait for the decision. Malformed events
    /// are recovered inside the guard by a resync.
    pub async fn ingest(&self, event: QuoteEventDto) -> GuardResult<GuardOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(GuardCommand::Event {
            event,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| GuardError::Stopped)
    }

    /// Enqueue a raw bridge event without waiting for it to be applied.
    pub async fn submit(&self, event: QuoteEventDto) -> GuardResult<()> {
        self.send(GuardCommand::Event { event, reply: None }).await
    }

    /// Fetch the full quote set and re-evaluate.
    pub async fn force_resync(&self) -> GuardResult<GuardOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(GuardCommand::Resync { reply: Some(reply) }).await?;
        rx.await.map_err(|_| GuardError::Stopped)?
    }

    /// Enqueue a resync without waiting for it.
    pub async fn request_resync(&self) -> GuardResult<()> {
        self.send(GuardCommand::Resync { reply: None }).await
    }

    /// Tear the guard down. Commands already queued ahead of this are still
    /// applied; anything after is rejected.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(GuardCommand::Shutdown).await;
    }

    /// Latest published status.
    pub fn status(&self) -> GuardStatus {
        self.status.borrow().clone()
    }

    /// Render gate for the presentation layer.
    pub fn ready_to_render(&self) -> bool {
        self.status.borrow().ready_to_render
    }

    /// Subscribe to status changes.
    pub fn watch_status(&self) -> watch::Receiver<GuardStatus> {
        self.status.clone()
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Spawn the consumer task for a guard.
pub fn spawn_route_guard(
    guard: RouteGuard,
    canonical: Arc<dyn CanonicalStateService>,
    queue_capacity: usize,
) -> (RouteGuardHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let (status_tx, status_rx) = watch::channel(guard.status());

    let handle = RouteGuardHandle {
        engagement_id: guard.engagement_id().clone(),
        observer_id: guard.observer_id(),
        commands: tx,
        status: status_rx,
    };

    let actor = GuardActor {
        guard,
        canonical,
        status: status_tx,
    };
    let task = tokio::spawn(actor.run(rx));

    (handle, task)
}

struct GuardActor {
    guard: RouteGuard,
    canonical: Arc<dyn CanonicalStateService>,
    status: watch::Sender<GuardStatus>,
}

impl GuardActor {
    async fn run(mut self, mut commands: mpsc::Receiver<GuardCommand>) {
        while let Some(command) = commands.recv().await {
            let stop = matches!(command, GuardCommand::Shutdown);
            self.handle(command).await;
            if stop {
                break;
            }
        }

        // Dropping the receiver rejects later sends; queued commands behind a
        // shutdown are discarded with it.
        commands.close();
        self.guard.teardown();
        self.publish();
        debug!(engagement_id = %self.guard.engagement_id(), "guard actor stopped");
    }

    async fn handle(&mut self, command: GuardCommand) {
        match command {
            GuardCommand::Initialize {
                baseline,
                current_route,
                reply,
            } => {
                let baseline = match baseline {
                    Some(baseline) => Ok(baseline),
                    None => self.fetch().await,
                };
                let outcome = self.guard.initialize(baseline, current_route);
                self.publish();
                let _ = reply.send(outcome);
            }
            GuardCommand::Patch {
                quote_id,
                patch,
                reply,
            } => {
                let outcome = self.guard.on_quote_event(&quote_id, &patch);
                self.publish();
                let _ = reply.send(outcome);
            }
            GuardCommand::Event { event, reply } => {
                let outcome = match self.guard.ingest(event) {
                    GuardOutcome::ResyncRequired(_) => match self.resync().await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            warn!(
                                engagement_id = %self.guard.engagement_id(),
                                error = %err,
                                "resync after malformed event failed"
                            );
                            GuardOutcome::Unchanged
                        }
                    },
                    outcome => outcome,
                };
                self.publish();
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            GuardCommand::Resync { reply } => {
                let result = self.resync().await;
                self.publish();
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            warn!(
                                engagement_id = %self.guard.engagement_id(),
                                error = %err,
                                "background resync failed"
                            );
                        }
                    }
                }
            }
            GuardCommand::Shutdown => self.guard.teardown(),
        }
    }

    /// Status is published before any reply so callers observe it on return.
    fn publish(&self) {
        self.status.send_replace(self.guard.status());
    }

    async fn fetch(&self) -> Result<Baseline, CanonicalStateError> {
        self.canonical
            .fetch_route_state(self.guard.engagement_id())
            .await
            .map(Baseline::from)
    }

    async fn resync(&mut self) -> GuardResult<GuardOutcome> {
        let baseline = self.fetch().await?;
        Ok(self.guard.apply_resync(baseline))
    }
}
