//! `stagegate watch`: keep a guard mounted against the canonical service.
//!
//! Runs without an event bridge, so the guard converges through periodic
//! resyncs. Each navigation is printed and the guard is re-mounted on the new
//! route, the way a client would after the replacement lands.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, EngagementId, ObserverId, Route};
use crate::infrastructure::canonical::HttpCanonicalStateService;
use crate::infrastructure::navigation::ChannelNavigator;
use crate::services::guard_supervisor::{GuardSupervisor, MountRequest};
use crate::services::route_table::RouteTable;

/// Arguments for `stagegate watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Engagement to watch
    #[arg(short, long)]
    pub engagement: String,

    /// Route the client starts on
    #[arg(short, long)]
    pub route: String,

    /// Override the reconciliation poll interval, in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

/// One navigation observed while watching.
#[derive(Debug, Serialize)]
pub struct NavigationOutput {
    /// Engagement id
    pub engagement_id: EngagementId,
    /// Route before the replacement
    pub from: Route,
    /// Route after the replacement
    pub to: Route,
    /// When the replacement was issued
    pub at: DateTime<Utc>,
}

impl CommandOutput for NavigationOutput {
    fn to_human(&self) -> String {
        format!(
            "[{}] {}: {} -> {}",
            self.at.format("%H:%M:%S"),
            self.engagement_id,
            self.from,
            self.to
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run `stagegate watch` until Ctrl-C.
pub async fn execute(args: WatchArgs, config: &Config, json_mode: bool) -> Result<()> {
    let canonical = HttpCanonicalStateService::from_config(config)
        .context("Failed to create canonical state client")?;

    let mut reconciliation = config.reconciliation.clone();
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        reconciliation.poll_interval_ms = poll_interval_ms.max(1);
    }

    let supervisor = GuardSupervisor::new(
        Arc::new(canonical),
        RouteTable::new(config.routes.clone()),
        reconciliation,
    );

    let engagement_id = EngagementId::new(args.engagement);
    let observer_id = ObserverId::new();
    let (navigator, mut navigations) = ChannelNavigator::new();
    let navigator = Arc::new(navigator);

    let mut current = Route::new(&args.route);
    supervisor
        .mount(
            MountRequest::new(engagement_id.clone(), current.clone(), navigator.clone())
                .with_observer(observer_id),
        )
        .await
        .context("Failed to mount route guard")?;

    info!(engagement_id = %engagement_id, route = %current, "watching");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = navigations.recv() => {
                let Some(to) = next else { break };
                output(
                    &NavigationOutput {
                        engagement_id: engagement_id.clone(),
                        from: current.clone(),
                        to: to.clone(),
                        at: Utc::now(),
                    },
                    json_mode,
                );
                current = to;
                supervisor
                    .mount(
                        MountRequest::new(engagement_id.clone(), current.clone(), navigator.clone())
                            .with_observer(observer_id),
                    )
                    .await
                    .context("Failed to re-mount route guard")?;
            }
        }
    }

    supervisor.shutdown().await;
    Ok(())
}
