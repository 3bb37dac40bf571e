//! Stage and route values.
//!
//! A stage is never stored. It is the output of the resolver for one quote
//! snapshot, and a route is where that stage lives in the client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow step the counterpart should currently be looking at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Default stage; offerings can be browsed.
    #[default]
    Pending,
    /// A quote is open for negotiation
    Negotiating,
    /// A selected quote is being closed
    Closing,
    /// A quote has been approved
    PostApproval,
}

impl Stage {
    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Negotiating => "negotiating",
            Self::Closing => "closing",
            Self::PostApproval => "post_approval",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized client path.
///
/// Query string and fragment are dropped, repeated slashes collapse, and a
/// trailing slash is removed (except for the root). Two routes are the same
/// route iff their normalized strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Route(String);

impl Route {
    /// Normalize and wrap a path.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize_path(path.as_ref()))
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Route {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&str> for Route {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<Route> for String {
    fn from(route: Route) -> Self {
        route.0
    }
}

fn normalize_path(raw: &str) -> String {
    let path = raw
        .trim()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

/// Where an engagement should be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteTarget {
    /// A stage inside the negotiation workflow.
    Stage {
        /// Stage to display
        stage: Stage,
    },
    /// Out of the workflow entirely, to the resource created from an
    /// approved quote.
    Exit {
        /// Downstream resource id
        resource_id: String,
    },
}

impl RouteTarget {
    /// Target for a stage.
    pub fn stage(stage: Stage) -> Self {
        Self::Stage { stage }
    }

    /// True for an exit target.
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit { .. })
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage { stage } => write!(f, "{stage}"),
            Self::Exit { resource_id } => write!(f, "exit:{resource_id}"),
        }
    }
}
