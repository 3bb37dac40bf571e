//! `stagegate resolve`: offline stage and route for a quote set.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::cli::commands::read_document;
use crate::cli::output::{list_table, or_dash, output, CommandOutput};
use crate::domain::models::{
    Baseline, Config, EngagementId, QuoteDto, RouteStateDto, RouteTarget, Stage,
};
use crate::services::route_table::RouteTable;
use crate::services::stage_resolver;

/// Arguments for `stagegate resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Quote set: a list of quotes or a route-state document (JSON or YAML)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Engagement the quotes belong to, used to render the route
    #[arg(short, long, default_value = "engagement")]
    pub engagement: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuoteFile {
    List(Vec<QuoteDto>),
    State(RouteStateDto),
}

impl From<QuoteFile> for RouteStateDto {
    fn from(file: QuoteFile) -> Self {
        match file {
            QuoteFile::List(quotes) => RouteStateDto {
                quotes,
                precomputed_route: None,
            },
            QuoteFile::State(state) => state,
        }
    }
}

/// Offline routing decision for a quote set.
#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    /// Engagement id
    pub engagement_id: EngagementId,
    /// Resolved stage
    pub stage: Stage,
    /// Routing target, stage or exit
    pub target: RouteTarget,
    /// Concrete route for the target
    pub route: String,
    /// Quotes that took part in resolution
    pub quotes_considered: usize,
    /// Quotes skipped for an unknown status
    pub quotes_skipped: usize,
    /// Normalized input quotes
    pub quotes: Vec<QuoteDto>,
}

impl CommandOutput for ResolveOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Engagement:  {}", self.engagement_id),
            format!("Stage:       {}", self.stage),
            format!("Target:      {}", self.target),
            format!("Route:       {}", self.route),
        ];
        if self.quotes_skipped > 0 {
            lines.push(format!(
                "Skipped:     {} quote(s) with unknown status",
                self.quotes_skipped
            ));
        }

        if !self.quotes.is_empty() {
            let mut table = list_table(&["id", "status", "selected", "visible", "linked"]);
            for quote in &self.quotes {
                table.add_row(vec![
                    quote.id.clone(),
                    quote.status.clone(),
                    quote.selected_by_counterpart.to_string(),
                    quote.visible_to_counterpart.to_string(),
                    or_dash(quote.linked_resource_id.as_deref()),
                ]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Resolve a route-state document against a route table.
pub fn resolve_document(
    engagement_id: EngagementId,
    state: RouteStateDto,
    routes: &RouteTable,
) -> ResolveOutput {
    let total = state.quotes.len();
    let baseline = Baseline::from(state);
    let quotes: Vec<QuoteDto> = baseline.quotes.iter().map(QuoteDto::from).collect();

    let stage = stage_resolver::resolve(&baseline.quotes);
    let target = stage_resolver::resolve_target(&baseline.quotes);
    let route = routes.route_for(&engagement_id, &target);

    ResolveOutput {
        engagement_id,
        stage,
        target,
        route: route.to_string(),
        quotes_considered: baseline.quotes.len(),
        quotes_skipped: total - baseline.quotes.len(),
        quotes,
    }
}

/// Run `stagegate resolve`.
pub async fn execute(args: ResolveArgs, config: &Config, json_mode: bool) -> Result<()> {
    let file: QuoteFile = read_document(&args.file)?;
    let routes = RouteTable::new(config.routes.clone());
    let out = resolve_document(EngagementId::new(args.engagement), file.into(), &routes);
    output(&out, json_mode);
    Ok(())
}
