//! HTTP canonical state client against a mock server.

use mockito::Server;
use stagegate::domain::models::{Baseline, CanonicalServiceConfig, EngagementId, Route};
use stagegate::domain::ports::{CanonicalStateError, CanonicalStateService};
use stagegate::infrastructure::canonical::{
    HttpCanonicalStateService, RetryPolicy, TokenBucketRateLimiter,
};

const ROUTE_STATE_PATH: &str = "/engagement/e1/route-state";

fn client(base_url: String, max_retries: u32) -> HttpCanonicalStateService {
    HttpCanonicalStateService::new(
        &CanonicalServiceConfig {
            base_url,
            timeout_secs: 5,
        },
        TokenBucketRateLimiter::new(100.0),
        RetryPolicy::new(max_retries, 5, 20),
    )
    .expect("client builds")
}

#[tokio::test]
async fn test_fetch_decodes_route_state() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", ROUTE_STATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "quotes": [
                    {"id": "a", "status": "closing_legacy", "selected_by_counterpart": true,
                     "visible_to_counterpart": true, "linked_resource_id": null},
                    {"id": "b", "status": "approved", "linked_resource_id": "p-1"}
                ],
                "precomputed_route": "/projects/p-1"
            }"#,
        )
        .expect(1)
        .create_async()
        .await;

    let dto = client(server.url(), 0)
        .fetch_route_state(&EngagementId::new("e1"))
        .await
        .unwrap();
    mock.assert_async().await;

    assert_eq!(dto.quotes.len(), 2);
    assert!(dto.quotes[1].visible_to_counterpart);

    let baseline = Baseline::from(dto);
    assert_eq!(baseline.precomputed_route, Some(Route::new("/projects/p-1")));
    assert_eq!(baseline.quotes[0].status.as_str(), "closing");
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", ROUTE_STATE_PATH)
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let err = client(server.url(), 3)
        .fetch_route_state(&EngagementId::new("e1"))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err, CanonicalStateError::NotFound(EngagementId::new("e1")));
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", ROUTE_STATE_PATH)
        .with_status(403)
        .with_body("forbidden")
        .expect(1)
        .create_async()
        .await;

    let err = client(server.url(), 3)
        .fetch_route_state(&EngagementId::new("e1"))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err, CanonicalStateError::Rejected(403, "forbidden".to_string()));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_then_success() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", ROUTE_STATE_PATH)
        .with_status(503)
        .with_body("unavailable")
        .expect(1)
        .create_async()
        .await;
    let succeeding = server
        .mock("GET", ROUTE_STATE_PATH)
        .with_status(200)
        .with_body(r#"{"quotes": [], "precomputed_route": null}"#)
        .expect(1)
        .create_async()
        .await;

    let dto = client(server.url(), 3)
        .fetch_route_state(&EngagementId::new("e1"))
        .await
        .unwrap();

    failing.assert_async().await;
    succeeding.assert_async().await;
    assert!(dto.quotes.is_empty());
}

#[tokio::test]
async fn test_rate_limited_until_budget_exhausted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", ROUTE_STATE_PATH)
        .with_status(429)
        .expect(3)
        .create_async()
        .await;

    let err = client(server.url(), 2)
        .fetch_route_state(&EngagementId::new("e1"))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err, CanonicalStateError::RateLimited);
}

#[tokio::test]
async fn test_invalid_body_is_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", ROUTE_STATE_PATH)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let err = client(server.url(), 0)
        .fetch_route_state(&EngagementId::new("e1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CanonicalStateError::Decode(_)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let err = client("http://127.0.0.1:1".to_string(), 1)
        .fetch_route_state(&EngagementId::new("e1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CanonicalStateError::Network(_)));
    assert!(err.is_transient());
}
