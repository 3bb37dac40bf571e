use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::models::Route;
use crate::domain::ports::NavigationSink;

/// Forwards route replacements over an unbounded channel.
///
/// `replace_route` never blocks the guard; a dropped receiver only produces
/// a warning.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    sender: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    /// Navigator plus the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NavigationSink for ChannelNavigator {
    fn replace_route(&self, route: &Route) {
        if self.sender.send(route.clone()).is_err() {
            warn!(route = %route, "navigation receiver dropped");
        }
    }
}
