//! Navigation sinks
//!
//! - `RecordingNavigator` keeps every issued replacement in memory
//! - `ChannelNavigator` forwards replacements to an async consumer

mod channel;

pub use channel::ChannelNavigator;

use std::sync::Mutex;

use tracing::info;

use crate::domain::models::Route;
use crate::domain::ports::NavigationSink;

/// Records every route replacement in issue order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    /// Create a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every route issued so far.
    pub fn routes(&self) -> Vec<Route> {
        self.routes
            .lock()
            .map(|routes| routes.clone())
            .unwrap_or_default()
    }

    /// Most recent route, if any.
    pub fn last(&self) -> Option<Route> {
        self.routes.lock().ok().and_then(|routes| routes.last().cloned())
    }
}

impl NavigationSink for RecordingNavigator {
    fn replace_route(&self, route: &Route) {
        info!(route = %route, "replace route");
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route.clone());
        }
    }
}
