//! Errors raised by port implementations.

use thiserror::Error;

use crate::domain::models::EngagementId;

/// Canonical state service errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalStateError {
    /// 404 from the service
    #[error("Engagement not found: {0}")]
    NotFound(EngagementId),

    /// 429 from the service
    #[error("Canonical state service rate limit exceeded")]
    RateLimited,

    /// 5xx with status code and body
    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    /// Non-retryable 4xx with status code and body
    #[error("Request rejected ({0}): {1}")]
    Rejected(u16, String),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its timeout
    #[error("Request timeout")]
    Timeout,

    /// Success response with a body that does not decode
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Service or adapter unavailable
    #[error("Canonical state unavailable: {0}")]
    Unavailable(String),
}

impl CanonicalStateError {
    /// Returns true if the call may succeed when retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::Server(_, _)
                | Self::Network(_)
                | Self::Timeout
                | Self::Unavailable(_)
        )
    }
}

/// Event bridge errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Subscription could not be opened
    #[error("Subscription to engagement {0} failed: {1}")]
    SubscribeFailed(EngagementId, String),

    /// Closed
    #[error("Event bridge is shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CanonicalStateError::RateLimited.is_transient());
        assert!(CanonicalStateError::Server(503, "busy".into()).is_transient());
        assert!(CanonicalStateError::Timeout.is_transient());
        assert!(CanonicalStateError::Network("reset".into()).is_transient());

        assert!(!CanonicalStateError::NotFound("e1".into()).is_transient());
        assert!(!CanonicalStateError::Rejected(403, "no".into()).is_transient());
        assert!(!CanonicalStateError::Decode("bad json".into()).is_transient());
    }
}
