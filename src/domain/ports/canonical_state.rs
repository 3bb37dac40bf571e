//! Port to the authoritative route-state reader.

use async_trait::async_trait;

use crate::domain::models::{EngagementId, RouteStateDto};
use crate::domain::ports::errors::CanonicalStateError;

/// Authoritative read of an engagement's routing state.
///
/// Backs both the initial baseline and every resync. Implementations must be
/// idempotent and safe to call repeatedly.
#[async_trait]
pub trait CanonicalStateService: Send + Sync {
    /// Fetch the full quote set and the server-side route decision, if any
    async fn fetch_route_state(
        &self,
        engagement_id: &EngagementId,
    ) -> Result<RouteStateDto, CanonicalStateError>;
}
