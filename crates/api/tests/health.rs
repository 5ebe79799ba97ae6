//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, get};

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let test = common::build_test_app(Vec::new());
    let response = get(test.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let test = common::build_test_app(Vec::new());
    let response = get(test.app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_on_webhook_route_is_method_not_allowed() {
    let test = common::build_test_app(Vec::new());
    let response = get(test.app, "/").await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let test = common::build_test_app(Vec::new());
    let response = get(test.app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("response must carry x-request-id");
    let id_str = request_id.to_str().expect("ascii header");
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}
