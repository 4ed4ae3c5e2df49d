//! HTTP routes exercised through the router without a socket

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use order_service::api::create_router;
use order_service::core::AppState;
use order_service::db::{MemoryOrderStore, OrderStore, StoreError, Table};
use serde_json::Value;
use shared::models::fixtures;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app() -> (Router, Arc<MemoryOrderStore>) {
    let store = Arc::new(MemoryOrderStore::new());
    let state = AppState::with_store(store.clone(), 16);
    (create_router(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(body: Vec<u8>) -> Request<Body> {
    Request::post("/order")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_get_stored_order() {
    let (app, store) = app();
    let order = fixtures::order("123");
    store.insert(&order, &CancellationToken::new()).await.unwrap();

    let (status, body) = send(&app, get("/order/123")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["order_uid"], "123");
    assert_eq!(body["data"]["payment"]["currency"], "USD");
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["date_created"], "2021-11-26T06:22:19Z");
}

#[tokio::test]
async fn test_get_unknown_order_is_404() {
    let (app, _store) = app();

    let (status, body) = send(&app, get("/order/missing")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
    assert_eq!(body["details"]["order_uid"], "missing");
}

#[tokio::test]
async fn test_get_blank_id_is_400() {
    let (app, store) = app();

    let (status, body) = send(&app, get("/order/%20")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);
    assert_eq!(store.fetch_calls(), 0);
}

#[tokio::test]
async fn test_get_store_failure_is_generic_500() {
    let (app, store) = app();
    store.insert(&fixtures::order("a"), &CancellationToken::new()).await.unwrap();
    store.fail_on(Table::Items, StoreError::Transient("password authentication failed".into()));

    let (status, body) = send(&app, get("/order/a")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 9001);
    assert!(!body.to_string().contains("password"));
}

#[tokio::test]
async fn test_post_then_get() {
    let (app, store) = app();
    let order = fixtures::order_with_items("new", 2);

    let (status, body) = send(&app, post_json(serde_json::to_vec(&order).unwrap())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order_uid"], "new");

    let (status, body) = send(&app, get("/order/new")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    // Read-your-write from the cache
    assert_eq!(store.fetch_calls(), 0);
}

#[tokio::test]
async fn test_post_duplicate_is_409() {
    let (app, _store) = app();
    let body = serde_json::to_vec(&fixtures::order("dup")).unwrap();

    let (status, _) = send(&app, post_json(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, post_json(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);
}

#[tokio::test]
async fn test_post_invalid_order_is_400() {
    let (app, store) = app();
    let mut order = fixtures::order("bad");
    order.delivery.phone.clear();

    let (status, body) = send(&app, post_json(serde_json::to_vec(&order).unwrap())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn test_post_malformed_json_is_400() {
    let (app, _store) = app();

    let (status, body) = send(&app, post_json(b"{\"order_uid\":".to_vec())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 6);
}

#[tokio::test]
async fn test_post_transient_failure_is_503() {
    let (app, store) = app();
    store.fail_on(Table::Payment, StoreError::Transient("pool timed out".into()));

    let body = serde_json::to_vec(&fixtures::order("t")).unwrap();
    let (status, body) = send(&app, post_json(body)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 9404);
    assert_eq!(store.row_counts("t").total(), 0);
}

#[tokio::test]
async fn test_health() {
    let (app, _store) = app();

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "order-service");
    assert_eq!(body["cache"]["capacity"], 16);
    assert_eq!(body["ingest"]["acked"], 0);
}
