//! `stagegate replay`: drive a real guard through a recorded scenario.
//!
//! The scenario's baseline seeds an in-memory canonical service. Each event
//! is applied to that canonical state and then published on an in-memory
//! bridge, so the guard sees exactly what a client would: pushed events plus
//! resyncs that agree with them. When the guard navigates, it is re-mounted
//! on the new route.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use crate::cli::commands::read_document;
use crate::cli::output::{list_table, or_dash, output, CommandOutput};
use crate::domain::models::{
    Baseline, ChangeType, Config, EngagementId, ObserverId, QuoteChange, QuoteDto, QuoteEvent,
    QuoteEventDto, ReconciliationConfig, Route, RouteStateDto, RouteTarget, Stage,
};
use crate::infrastructure::bridge::InMemoryEventBridge;
use crate::infrastructure::canonical::InMemoryCanonicalState;
use crate::infrastructure::navigation::ChannelNavigator;
use crate::services::guard_supervisor::{GuardSupervisor, MountRequest};
use crate::services::route_guard::GuardStatus;
use crate::services::route_table::RouteTable;
use crate::services::shadow_state::ShadowStateStore;
use crate::services::stage_resolver;

/// Upper bound on how long one event may take to reach the guard.
const EVENT_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);
/// Navigation chains longer than this indicate a route table loop.
const MAX_REMOUNTS_PER_STEP: usize = 4;

/// Arguments for `stagegate replay`.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Scenario document (YAML or JSON)
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Recorded scenario: a baseline followed by bridge events in delivery order.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Engagement the scenario runs against
    pub engagement_id: String,
    /// Route the client opens first; the pending route when omitted
    #[serde(default)]
    pub current_route: Option<String>,
    /// Canonical state before the first event
    #[serde(default)]
    pub baseline: RouteStateDto,
    /// Events, in delivery order
    #[serde(default)]
    pub events: Vec<QuoteEventDto>,
}

/// One navigation issued during a replay.
#[derive(Debug, Serialize)]
pub struct NavigationRow {
    /// Index of the event that caused it; 0 for the initial load
    pub step: usize,
    /// What triggered the navigation
    pub trigger: String,
    /// Route before the replacement
    pub from: Route,
    /// Route after the replacement
    pub to: Route,
}

/// Summary of a replayed scenario.
#[derive(Debug, Serialize)]
pub struct ReplayOutput {
    /// Engagement id
    pub engagement_id: EngagementId,
    /// Events delivered
    pub events: usize,
    /// Navigations, in issue order
    pub navigations: Vec<NavigationRow>,
    /// Route the client ended on
    pub final_route: Route,
    /// Stage of the final canonical quote set
    pub final_stage: Stage,
    /// Routing target of the final canonical quote set
    pub final_target: RouteTarget,
    /// Render gate after the last event
    pub ready_to_render: bool,
}

impl CommandOutput for ReplayOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Replayed {} event(s) for engagement {}",
            self.events, self.engagement_id
        )];

        if self.navigations.is_empty() {
            lines.push("No navigations issued.".to_string());
        } else {
            let mut table = list_table(&["step", "trigger", "from", "to"]);
            for row in &self.navigations {
                table.add_row(vec![
                    row.step.to_string(),
                    row.trigger.clone(),
                    row.from.to_string(),
                    row.to.to_string(),
                ]);
            }
            lines.push(table.to_string());
        }

        lines.push(format!("Final stage:  {}", self.final_stage));
        lines.push(format!("Final route:  {}", self.final_route));
        lines.push(format!("Renderable:   {}", self.ready_to_render));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

struct Replayer {
    engagement_id: EngagementId,
    observer_id: ObserverId,
    canonical: Arc<InMemoryCanonicalState>,
    bridge: Arc<InMemoryEventBridge>,
    supervisor: GuardSupervisor,
    navigator: Arc<ChannelNavigator>,
    navigations: mpsc::UnboundedReceiver<Route>,
    truth: ShadowStateStore,
    current: Route,
    rows: Vec<NavigationRow>,
}

impl Replayer {
    fn publish_truth(&self) {
        let quotes = self.truth.snapshot().iter().map(QuoteDto::from).collect();
        self.canonical.set_quotes(&self.engagement_id, quotes);
    }

    async fn mount(&self) -> Result<()> {
        self.supervisor
            .mount(
                MountRequest::new(
                    self.engagement_id.clone(),
                    self.current.clone(),
                    self.navigator.clone(),
                )
                .with_observer(self.observer_id),
            )
            .await
            .context("Failed to mount route guard")?;
        Ok(())
    }

    /// Follow issued navigations, re-mounting on each new route.
    async fn follow_navigations(&mut self, step: usize, trigger: &str) -> Result<()> {
        for _ in 0..MAX_REMOUNTS_PER_STEP {
            let Ok(to) = self.navigations.try_recv() else {
                return Ok(());
            };
            self.rows.push(NavigationRow {
                step,
                trigger: trigger.to_string(),
                from: self.current.clone(),
                to: to.clone(),
            });
            self.current = to;
            self.mount().await?;
        }
        anyhow::bail!("navigation did not converge after step {step}; check the route templates")
    }

    /// Apply the event to canonical state, then deliver it over the bridge
    /// and wait for the guard to process it.
    async fn step(&mut self, event: QuoteEventDto) -> Result<()> {
        match QuoteEvent::try_from(event.clone()) {
            Ok(valid) => {
                match valid.change {
                    QuoteChange::Insert(ref patch) | QuoteChange::Update(ref patch) => {
                        self.truth.merge(&valid.quote_id, patch);
                    }
                    QuoteChange::Delete => {
                        self.truth.remove(&valid.quote_id);
                    }
                }
                self.publish_truth();
                self.canonical
                    .set_precomputed_route(&self.engagement_id, None);
            }
            Err(err) => debug!(error = %err, "replaying malformed event as-is"),
        }

        let handle = self
            .supervisor
            .handle(&self.engagement_id, self.observer_id)
            .await
            .context("Route guard is not mounted")?;
        let mut status = handle.watch_status();
        let before = progress(&status.borrow());

        self.bridge.publish(&self.engagement_id, event).await;
        let settled = timeout(
            EVENT_SETTLE_TIMEOUT,
            status.wait_for(|current| progress(current) > before),
        )
        .await;
        if !matches!(settled, Ok(Ok(_))) {
            debug!("guard did not report within the settle timeout");
        }
        Ok(())
    }
}

/// Monotonic count of work a guard has done. Every event delivered to a
/// `Ready` guard moves it.
fn progress(status: &GuardStatus) -> u64 {
    status.events_applied + status.resyncs + status.navigations
}

fn describe(event: &QuoteEventDto) -> String {
    let kind = match event.change_type {
        ChangeType::Insert => "insert",
        ChangeType::Update => "update",
        ChangeType::Delete => "delete",
    };
    format!("{kind} {}", or_dash(event.quote_id.as_deref()))
}

/// Replay a scenario end to end.
pub async fn run_scenario(
    scenario: Scenario,
    routes: RouteTable,
    reconciliation: ReconciliationConfig,
) -> Result<ReplayOutput> {
    let engagement_id = EngagementId::new(scenario.engagement_id);
    let canonical = Arc::new(InMemoryCanonicalState::new());
    let bridge = Arc::new(InMemoryEventBridge::new(reconciliation.queue_capacity));
    let supervisor = GuardSupervisor::new(canonical.clone(), routes.clone(), reconciliation)
        .with_bridge(bridge.clone());
    let (navigator, navigations) = ChannelNavigator::new();

    let truth = ShadowStateStore::from_quotes(Baseline::from(scenario.baseline.clone()).quotes);
    canonical.set_quotes(&engagement_id, scenario.baseline.quotes);
    canonical.set_precomputed_route(&engagement_id, scenario.baseline.precomputed_route);

    let current = scenario
        .current_route
        .map(Route::new)
        .unwrap_or_else(|| routes.fallback_route(&engagement_id));

    let mut replayer = Replayer {
        engagement_id: engagement_id.clone(),
        observer_id: ObserverId::new(),
        canonical,
        bridge,
        supervisor,
        navigator: Arc::new(navigator),
        navigations,
        truth,
        current,
        rows: Vec::new(),
    };

    replayer.mount().await?;
    replayer.follow_navigations(0, "initialize").await?;

    let total = scenario.events.len();
    for (index, event) in scenario.events.into_iter().enumerate() {
        let trigger = describe(&event);
        replayer.step(event).await?;
        replayer.follow_navigations(index + 1, &trigger).await?;
    }

    let ready_to_render = match replayer
        .supervisor
        .handle(&engagement_id, replayer.observer_id)
        .await
    {
        Some(handle) => handle.ready_to_render(),
        None => false,
    };
    replayer.supervisor.shutdown().await;

    let quotes = replayer.truth.snapshot();
    Ok(ReplayOutput {
        engagement_id,
        events: total,
        navigations: replayer.rows,
        final_route: replayer.current,
        final_stage: stage_resolver::resolve(&quotes),
        final_target: stage_resolver::resolve_target(&quotes),
        ready_to_render,
    })
}

/// Run `stagegate replay`.
pub async fn execute(args: ReplayArgs, config: &Config, json_mode: bool) -> Result<()> {
    let scenario: Scenario = read_document(&args.file)?;
    let out = run_scenario(
        scenario,
        RouteTable::new(config.routes.clone()),
        config.reconciliation.clone(),
    )
    .await?;
    output(&out, json_mode);
    Ok(())
}
