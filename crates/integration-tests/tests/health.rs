//! Integration tests for health checks and request IDs.

use axum::http::StatusCode;
use serde_json::json;

use bazaar_integration_tests::TestApp;

#[tokio::test]
async fn test_readiness_reports_healthy() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::new();
    let response = app.get("/health/live", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_every_response_has_request_id() {
    let app = TestApp::new();
    let response = app.get("/v1/products/not-found-anyway", None).await;

    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();
    let response = app.get("/v1/nothing-here", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
