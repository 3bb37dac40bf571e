//! Port through which guards replace the client route.

use crate::domain::models::Route;

/// Client navigation.
///
/// Only replacement is offered: back-navigation must never land on an
/// intermediate route that has already been judged invalid. The call is
/// fire-and-forget and is not cancellable once issued.
pub trait NavigationSink: Send + Sync {
    /// Replace the current route; never push
    fn replace_route(&self, route: &Route);
}
