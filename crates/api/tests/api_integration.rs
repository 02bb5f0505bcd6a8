//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ProductId;
use jsonwebtoken::{EncodingKey, Header, encode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

use api::AppState;
use lock::InMemoryLockManager;
use store::{InMemoryOrderRepository, InMemoryStockLedger};
use api::config::Config;

const SECRET: &str = "integration-secret";

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

fn config() -> Config {
    Config {
        jwt_secret: SECRET.to_string(),
        ..Config::default()
    }
}

/// Builds an app with the given stock already registered.
async fn setup(stock: &[(i64, i64)]) -> (axum::Router, Arc<AppState>) {
    let state = api::create_default_state(&config());
    for (product_id, quantity) in stock {
        state
            .orders
            .inventory()
            .create_stock(ProductId::new(*product_id), *quantity)
            .await
            .unwrap();
    }
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn token(email: &str, role: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::default(),
        &json!({ "email": email, "role": role, "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn customer(email: &str) -> String {
    token(email, "customer")
}

fn admin() -> String {
    token("root@example.com", "admin")
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn stock_of(app: &axum::Router, product_id: i64) -> i64 {
    let (status, json) = send(app, "GET", &format!("/inventory/{product_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    json["quantity"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup(&[]).await;

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_order_reserves_stock() {
    let (app, _) = setup(&[(7, 10)]).await;
    let ana = customer("ana@example.com");

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&ana),
        Some(json!({ "items": [{ "product_id": 7, "quantity": 5 }] })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "PENDING");
    assert!(json["order_id"].as_str().is_some());
    assert_eq!(stock_of(&app, 7).await, 5);
}

#[tokio::test]
async fn test_guest_checkout_requires_email() {
    let (app, _) = setup(&[(1, 10)]).await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        None,
        Some(json!({ "items": [{ "product_id": 1, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "guest_email_required");

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        None,
        Some(json!({
            "email": "guest@example.com",
            "items": [{ "product_id": 1, "quantity": 1 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let order_id = json["order_id"].as_str().unwrap().to_string();
    let guest = customer("guest@example.com");
    let (status, json) = send(&app, "GET", &format!("/orders/{order_id}"), Some(&guest), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["owner"], "guest@example.com");
}

#[tokio::test]
async fn test_create_order_validation() {
    let (app, _) = setup(&[(1, 10)]).await;
    let ana = customer("ana@example.com");

    for body in [
        json!({ "items": [] }),
        json!({ "items": [{ "product_id": 1, "quantity": 0 }] }),
        json!({ "items": [{ "product_id": 1, "quantity": -2 }] }),
    ] {
        let (status, json) = send(&app, "POST", "/orders", Some(&ana), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "validation_failed");
    }

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&ana),
        Some(json!({ "items": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_failed");

    assert_eq!(stock_of(&app, 1).await, 10);
}

#[tokio::test]
async fn test_insufficient_stock() {
    let (app, _) = setup(&[(1, 2)]).await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&customer("ana@example.com")),
        Some(json!({ "items": [{ "product_id": 1, "quantity": 3 }] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "insufficient_stock");
    assert!(json["error"].as_str().is_some());
    assert_eq!(stock_of(&app, 1).await, 2);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let (app, _) = setup(&[]).await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&customer("ana@example.com")),
        Some(json!({ "items": [{ "product_id": 99, "quantity": 1 }] })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "stock_not_found");
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let (app, _) = setup(&[(1, 10)]).await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some("garbage"),
        Some(json!({
            "email": "guest@example.com",
            "items": [{ "product_id": 1, "quantity": 1 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "unauthorized");

    let (status, _) = send(&app, "GET", "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(stock_of(&app, 1).await, 10);
}

#[tokio::test]
async fn test_cancel_restores_stock_and_second_cancel_conflicts() {
    let (app, _) = setup(&[(7, 10)]).await;
    let ana = customer("ana@example.com");

    let (_, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&ana),
        Some(json!({ "items": [{ "product_id": 7, "quantity": 5 }] })),
    )
    .await;
    let order_id = json["order_id"].as_str().unwrap().to_string();
    let cancel_uri = format!("/orders/{order_id}/cancel");

    let (status, json) = send(&app, "POST", &cancel_uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CANCELLED");
    assert_eq!(json["restored"].as_array().unwrap().len(), 1);
    assert_eq!(stock_of(&app, 7).await, 10);

    let (status, json) = send(&app, "POST", &cancel_uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "order_already_cancelled");
    assert_eq!(stock_of(&app, 7).await, 10);
}

#[tokio::test]
async fn test_cancel_with_failing_restore_reports_reason_code() {
    let ledger = InMemoryStockLedger::with_stock([(1, 10)]).await;
    let state = api::create_state(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(ledger.clone()),
        Arc::new(InMemoryLockManager::new()),
        &config(),
    );
    let app = api::create_app(state, get_metrics_handle());
    let ana = customer("ana@example.com");

    let (_, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&ana),
        Some(json!({ "items": [{ "product_id": 1, "quantity": 2 }] })),
    )
    .await;
    let order_id = json["order_id"].as_str().unwrap().to_string();
    ledger.fail_adjustments_for(ProductId::new(1)).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/cancel"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CANCELLED");
    assert_eq!(json["failed"][0]["product_id"], 1);
    assert_eq!(json["failed"][0]["reason"], "unavailable");
    assert!(!json.to_string().contains("switched off"));
    assert_eq!(ledger.quantity(ProductId::new(1)).await, Some(8));
}

#[tokio::test]
async fn test_cancel_by_stranger_is_forbidden() {
    let (app, _) = setup(&[(1, 10)]).await;

    let (_, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&customer("ana@example.com")),
        Some(json!({ "items": [{ "product_id": 1, "quantity": 4 }] })),
    )
    .await;
    let order_id = json["order_id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/cancel"),
        Some(&customer("bob@example.com")),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");
    assert_eq!(stock_of(&app, 1).await, 6);
}

#[tokio::test]
async fn test_confirm_is_admin_only() {
    let (app, _) = setup(&[(1, 10)]).await;
    let ana = customer("ana@example.com");

    let (_, json) = send(
        &app,
        "POST",
        "/orders",
        Some(&ana),
        Some(json!({ "items": [{ "product_id": 1, "quantity": 2 }] })),
    )
    .await;
    let confirm_uri = format!("/orders/{}/confirm", json["order_id"].as_str().unwrap());

    let (status, _) = send(&app, "POST", &confirm_uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&app, "POST", &confirm_uri, Some(&admin()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(stock_of(&app, 1).await, 8);

    let (status, json) = send(&app, "POST", &confirm_uri, Some(&admin()), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "invalid_transition");
}

#[tokio::test]
async fn test_list_orders_by_role() {
    let (app, _) = setup(&[(1, 10)]).await;
    let ana = customer("ana@example.com");
    let bob = customer("bob@example.com");

    for token in [&ana, &ana, &bob] {
        let (status, _) = send(
            &app,
            "POST",
            "/orders",
            Some(token),
            Some(json!({ "items": [{ "product_id": 1, "quantity": 1 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(&app, "GET", "/orders", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o["owner"] == "ana@example.com"));

    let (_, json) = send(&app, "GET", "/orders", Some(&admin()), None).await;
    assert_eq!(json.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_get_order_errors() {
    let (app, _) = setup(&[]).await;
    let ana = customer("ana@example.com");

    let (status, json) = send(&app, "GET", "/orders/not-a-uuid", Some(&ana), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_failed");

    let (status, json) = send(
        &app,
        "GET",
        "/orders/00000000-0000-0000-0000-000000000000",
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "order_not_found");
}

#[tokio::test]
async fn test_inventory_admin_endpoints() {
    let (app, _) = setup(&[]).await;
    let root = admin();

    let (status, _) = send(
        &app,
        "POST",
        "/inventory",
        Some(&customer("ana@example.com")),
        Some(json!({ "product_id": 5, "quantity": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &app,
        "POST",
        "/inventory",
        Some(&root),
        Some(json!({ "product_id": 5, "quantity": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["quantity"], 10);

    let (status, json) = send(
        &app,
        "POST",
        "/inventory",
        Some(&root),
        Some(json!({ "product_id": 5, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "stock_already_exists");

    let (status, json) = send(
        &app,
        "POST",
        "/inventory",
        Some(&root),
        Some(json!({ "product_id": 0, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation_failed");

    let (status, json) = send(
        &app,
        "POST",
        "/inventory/5/adjust",
        Some(&root),
        Some(json!({ "change": -3, "reason": "theft" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 7);

    let (status, json) = send(
        &app,
        "POST",
        "/inventory/5/adjust",
        Some(&root),
        Some(json!({ "change": -8 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "insufficient_stock");
    assert_eq!(stock_of(&app, 5).await, 7);
}

#[tokio::test]
async fn test_batch_adjust_reports_failures() {
    let (app, _) = setup(&[(1, 5), (2, 5)]).await;

    let (status, json) = send(
        &app,
        "POST",
        "/inventory/batch",
        Some(&admin()),
        Some(json!({ "items": [
            { "product_id": 1, "change": 2 },
            { "product_id": 3, "change": 1 },
            { "product_id": 2, "change": -1 }
        ] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["applied"].as_array().unwrap().len(), 2);
    assert_eq!(json["failed"].as_array().unwrap().len(), 1);
    assert_eq!(json["failed"][0]["product_id"], 3);
    assert_eq!(json["failed"][0]["reason"], "not_found");
    assert_eq!(stock_of(&app, 1).await, 7);
    assert_eq!(stock_of(&app, 2).await, 4);
}

#[tokio::test]
async fn test_missing_stock_record_is_not_found() {
    let (app, _) = setup(&[]).await;
    let (status, json) = send(&app, "GET", "/inventory/42", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "stock_not_found");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup(&[(1, 10)]).await;

    send(
        &app,
        "POST",
        "/orders",
        Some(&customer("ana@example.com")),
        Some(json!({ "items": [{ "product_id": 1, "quantity": 1 }] })),
    )
    .await;

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

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
