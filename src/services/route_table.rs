//! Mapping from routing targets to concrete client routes.

use crate::domain::models::{EngagementId, Route, RouteTarget, RoutesConfig, Stage};

const ENGAGEMENT_PLACEHOLDER: &str = "{engagement_id}";
const RESOURCE_PLACEHOLDER: &str = "{resource_id}";

/// Route templates for one deployment.
#[derive(Debug, Clone)]
pub struct RouteTable {
    templates: RoutesConfig,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(RoutesConfig::default())
    }
}

impl RouteTable {
    /// Create a new instance.
    pub fn new(templates: RoutesConfig) -> Self {
        Self { templates }
    }

    fn template(&self, stage: Stage) -> &str {
        match stage {
            Stage::Pending => &self.templates.pending,
            Stage::Negotiating => &self.templates.negotiating,
            Stage::Closing => &self.templates.closing,
            Stage::PostApproval => &self.templates.post_approval,
        }
    }

    /// Route for a target within one engagement.
    ///
    /// Ids are percent-encoded, so each always fills exactly one path segment.
    pub fn route_for(&self, engagement_id: &EngagementId, target: &RouteTarget) -> Route {
        let path = match target {
            RouteTarget::Stage { stage } => self.template(*stage).to_string(),
            RouteTarget::Exit { resource_id } => self
                .templates
                .exit
                .replace(RESOURCE_PLACEHOLDER, &urlencoding::encode(resource_id)),
        };
        Route::new(path.replace(
            ENGAGEMENT_PLACEHOLDER,
            &urlencoding::encode(engagement_id.as_str()),
        ))
    }

    /// Fail-open route used when no baseline is available.
    pub fn fallback_route(&self, engagement_id: &EngagementId) -> Route {
        self.route_for(engagement_id, &RouteTarget::stage(Stage::Pending))
    }

    /// Template validation: stage routes must be engagement-scoped and the
    /// exit route must name the resource.
    pub fn validate(templates: &RoutesConfig) -> Result<(), String> {
        let stages = [
            ("pending", &templates.pending),
            ("negotiating", &templates.negotiating),
            ("closing", &templates.closing),
            ("post_approval", &templates.post_approval),
        ];
        for (name, template) in stages {
            if !template.contains(ENGAGEMENT_PLACEHOLDER) {
                return Err(format!(
                    "route '{name}' must contain {ENGAGEMENT_PLACEHOLDER}"
                ));
            }
        }
        if !templates.exit.contains(RESOURCE_PLACEHOLDER) {
            return Err(format!("route 'exit' must contain {RESOURCE_PLACEHOLDER}"));
        }

        let mut distinct: Vec<Route> = stages.iter().map(|(_, t)| Route::new(t)).collect();
        distinct.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        distinct.dedup();
        if distinct.len() != stages.len() {
            return Err("stage routes must be distinct".to_string());
        }
        Ok(())
    }
}
