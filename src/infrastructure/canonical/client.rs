//! HTTP client for the canonical state service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use tracing::{debug, instrument, warn};

use crate::domain::models::{CanonicalServiceConfig, Config, EngagementId, RouteStateDto};
use crate::domain::ports::{CanonicalStateError, CanonicalStateService};

use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;

/// Canonical state service reached over HTTP.
///
/// Calls `GET {base_url}/engagement/{id}/route-state`, throttled by a token
/// bucket and retried with exponential backoff on transient failures.
pub struct HttpCanonicalStateService {
    http_client: ReqwestClient,
    base_url: String,
    rate_limiter: Arc<TokenBucketRateLimiter>,
    retry_policy: RetryPolicy,
}

impl HttpCanonicalStateService {
    /// Build a client for one service endpoint.
    pub fn new(
        service: &CanonicalServiceConfig,
        rate_limiter: TokenBucketRateLimiter,
        retry_policy: RetryPolicy,
    ) -> Result<Self, CanonicalStateError> {
        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(service.timeout_secs))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CanonicalStateError::Unavailable(e.to_string()))?;

        debug!(base_url = %service.base_url, "canonical state client initialized");

        Ok(Self {
            http_client,
            base_url: service.base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(rate_limiter),
            retry_policy,
        })
    }

    /// Build from the full application config.
    pub fn from_config(config: &Config) -> Result<Self, CanonicalStateError> {
        Self::new(
            &config.canonical_service,
            TokenBucketRateLimiter::new(config.rate_limit.requests_per_second),
            RetryPolicy::from_config(&config.retry),
        )
    }

    fn route_state_url(&self, engagement_id: &EngagementId) -> String {
        format!(
            "{}/engagement/{}/route-state",
            self.base_url,
            urlencoding::encode(engagement_id.as_str())
        )
    }

    async fn fetch_once(
        &self,
        engagement_id: &EngagementId,
    ) -> Result<RouteStateDto, CanonicalStateError> {
        self.rate_limiter.acquire().await;

        let url = self.route_state_url(engagement_id);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        handle_response(engagement_id, response).await
    }
}

#[async_trait]
impl CanonicalStateService for HttpCanonicalStateService {
    #[instrument(skip(self), fields(engagement_id = %engagement_id))]
    async fn fetch_route_state(
        &self,
        engagement_id: &EngagementId,
    ) -> Result<RouteStateDto, CanonicalStateError> {
        self.retry_policy
            .execute(|| self.fetch_once(engagement_id))
            .await
    }
}

async fn handle_response(
    engagement_id: &EngagementId,
    response: Response,
) -> Result<RouteStateDto, CanonicalStateError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<RouteStateDto>()
            .await
            .map_err(|e| CanonicalStateError::Decode(e.to_string()));
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    warn!(status = status.as_u16(), body = %body, "canonical state request failed");

    Err(match status {
        StatusCode::NOT_FOUND => CanonicalStateError::NotFound(engagement_id.clone()),
        StatusCode::TOO_MANY_REQUESTS => CanonicalStateError::RateLimited,
        status if status.is_server_error() => CanonicalStateError::Server(status.as_u16(), body),
        status => CanonicalStateError::Rejected(status.as_u16(), body),
    })
}

fn classify_transport_error(err: reqwest::Error) -> CanonicalStateError {
    if err.is_timeout() {
        CanonicalStateError::Timeout
    } else {
        CanonicalStateError::Network(err.to_string())
    }
}
