//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::Money;
use metrics_exporter_prometheus::PrometheusHandle;
use store::InMemoryOrderStore;
use tower::ServiceExt;

use api::routes::orders::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryOrderStore) {
    let store = InMemoryOrderStore::new();
    let app = api::create_app(
        Arc::new(AppState {
            intake: store.clone(),
        }),
        get_metrics_handle(),
    );
    (app, store)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "order-intake");
}

#[tokio::test]
async fn test_place_order() {
    let (app, store) = setup();
    let coffee = store.insert_product(Money::from_cents(450), 10).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({
                "user_id": user_id(),
                "items": [
                    { "product_id": coffee.to_string(), "quantity": 2 }
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "pending");
    assert_eq!(json["total_cents"], 900);
    assert_eq!(json["items"][0]["quantity"], 2);
    assert_eq!(store.stock_of(coffee).await, Some(8));
}

#[tokio::test]
async fn test_place_order_with_no_items_is_bad_request() {
    let (app, _) = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({ "user_id": user_id(), "items": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_place_order_with_zero_quantity_is_bad_request() {
    let (app, store) = setup();
    let coffee = store.insert_product(Money::from_cents(450), 10).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({
                "user_id": user_id(),
                "items": [{ "product_id": coffee.to_string(), "quantity": 0 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_place_order_for_unknown_product_is_not_found() {
    let (app, _) = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({
                "user_id": user_id(),
                "items": [{ "product_id": uuid::Uuid::new_v4().to_string(), "quantity": 1 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversell_is_conflict() {
    let (app, store) = setup();
    let coffee = store.insert_product(Money::from_cents(450), 2).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({
                "user_id": user_id(),
                "items": [{ "product_id": coffee.to_string(), "quantity": 3 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("requested 3"));
    assert!(message.contains("available 2"));
    // Nothing was decremented.
    assert_eq!(store.stock_of(coffee).await, Some(2));
}

#[tokio::test]
async fn test_get_order_roundtrip() {
    let (app, store) = setup();
    let coffee = store.insert_product(Money::from_cents(450), 10).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({
                "user_id": user_id(),
                "items": [{ "product_id": coffee.to_string(), "quantity": 2 }]
            }),
        ))
        .await
        .unwrap();
    let created = json_body(response).await;
    let order_id = created["id"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["id"], created["id"]);
    assert_eq!(json["total_cents"], 900);
}

#[tokio::test]
async fn test_get_unknown_order_is_not_found() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_order_with_malformed_id_is_bad_request() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn place_test_order(app: &axum::Router, store: &InMemoryOrderStore) -> String {
    let coffee = store.insert_product(Money::from_cents(450), 10).await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            serde_json::json!({
                "user_id": user_id(),
                "items": [{ "product_id": coffee.to_string(), "quantity": 1 }]
            }),
        ))
        .await
        .unwrap();
    let json = json_body(response).await;
    json["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_admin_can_transition_status() {
    let (app, store) = setup();
    let order_id = place_test_order(&app, &store).await;

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "processing", "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "processing");
}

#[tokio::test]
async fn test_customer_transition_is_forbidden() {
    let (app, store) = setup();
    let order_id = place_test_order(&app, &store).await;

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "processing", "role": "customer" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_illegal_transition_is_conflict() {
    let (app, store) = setup();
    let order_id = place_test_order(&app, &store).await;

    // pending -> delivered skips two states.
    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            serde_json::json!({ "status": "delivered", "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_transition_unknown_order_is_not_found() {
    let (app, _) = setup();

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/orders/{}/status", uuid::Uuid::new_v4()),
            serde_json::json!({ "status": "processing", "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
