//! `stagegate check`: validate one route against the live canonical state.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{or_dash, output, CommandOutput};
use crate::domain::models::{Baseline, Config, EngagementId, ObserverId, Route};
use crate::domain::ports::CanonicalStateService;
use crate::infrastructure::canonical::HttpCanonicalStateService;
use crate::infrastructure::navigation::RecordingNavigator;
use crate::services::route_guard::{GuardOutcome, GuardPhase, RouteGuard};
use crate::services::route_table::RouteTable;

/// Arguments for `stagegate check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Engagement to check
    #[arg(short, long)]
    pub engagement: String,

    /// Route the client is displaying
    #[arg(short, long)]
    pub route: String,
}

/// Decision for one route check.
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    /// Engagement that was checked
    pub engagement_id: EngagementId,
    /// Route the client is on
    pub current_route: Route,
    /// `match` or `redirect`
    pub decision: &'static str,
    /// Route the guard settled on
    pub target_route: Option<Route>,
    /// Guard phase after initialize
    pub phase: GuardPhase,
    /// Quotes in the baseline
    pub quotes_tracked: usize,
    /// Set when the baseline could not be fetched and the guard failed open
    pub fetch_error: Option<String>,
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Engagement:  {}", self.engagement_id),
            format!("Route:       {}", self.current_route),
            format!("Decision:    {}", self.decision),
            format!("Target:      {}", or_dash(self.target_route.as_ref())),
            format!("Quotes:      {}", self.quotes_tracked),
        ];
        if let Some(ref err) = self.fetch_error {
            lines.push(format!("Baseline:    unavailable ({err}), used pending route"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run a one-shot initialize against `canonical` without navigating anywhere.
pub async fn check_route(
    canonical: &dyn CanonicalStateService,
    routes: RouteTable,
    engagement_id: EngagementId,
    current_route: Route,
) -> CheckOutput {
    let fetched = canonical.fetch_route_state(&engagement_id).await;
    let fetch_error = fetched.as_ref().err().map(ToString::to_string);

    let mut guard = RouteGuard::new(
        engagement_id.clone(),
        ObserverId::new(),
        routes,
        Arc::new(RecordingNavigator::new()),
    );
    let outcome = guard.initialize(fetched.map(Baseline::from), current_route.clone());
    let status = guard.status();

    CheckOutput {
        engagement_id,
        current_route,
        decision: match outcome {
            GuardOutcome::Navigated(_) => "redirect",
            _ => "match",
        },
        target_route: status.target_route,
        phase: status.phase,
        quotes_tracked: status.quotes_tracked,
        fetch_error,
    }
}

/// Run `stagegate check`.
pub async fn execute(args: CheckArgs, config: &Config, json_mode: bool) -> Result<()> {
    let canonical = HttpCanonicalStateService::from_config(config)
        .context("Failed to create canonical state client")?;

    let out = check_route(
        &canonical,
        RouteTable::new(config.routes.clone()),
        EngagementId::new(args.engagement),
        Route::new(&args.route),
    )
    .await;

    output(&out, json_mode);
    Ok(())
}
