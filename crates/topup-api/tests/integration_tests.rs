//! # Integration Tests for topup-api
//!
//! Drives the assembled router in in-memory mode: wallet lifecycle, rule
//! reconciliation (create, update, terminate, idempotence, inheritance),
//! error mapping, authentication, health probes, and OpenAPI generation.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use topup_api::state::{AppConfig, AppState};

/// Helper: build the test app with auth disabled.
fn test_app() -> axum::Router {
    topup_api::app(AppState::new())
}

/// Helper: build the test app with auth enabled.
fn test_app_with_auth(token: &str) -> axum::Router {
    let config = AppConfig {
        auth_token: Some(token.to_string()),
        ..AppConfig::default()
    };
    topup_api::app(AppState::with_config(config))
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

async fn create_wallet(app: &axum::Router, invoice_flag: bool) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/v1/wallets",
        Some(json!({ "name": "main", "invoice_requires_successful_payment": invoice_flag })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn put_rules(app: &axum::Router, wallet_id: &str, rules: Value) -> (StatusCode, Value) {
    send(
        app,
        "PUT",
        &format!("/v1/wallets/{wallet_id}/recurring_transaction_rules"),
        Some(json!({ "recurring_transaction_rules": rules })),
    )
    .await
}

fn threshold_spec() -> Value {
    json!({
        "trigger": "threshold",
        "threshold_credits": "10",
        "paid_credits": "5",
        "granted_credits": "1"
    })
}

fn interval_spec() -> Value {
    json!({
        "trigger": "interval",
        "interval": "monthly",
        "method": "target",
        "target_ongoing_balance": "200"
    })
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let (status, body) = send(&test_app(), "GET", "/health/liveness", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_readiness_probe() {
    let (status, body) = send(&test_app(), "GET", "/health/readiness", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

#[tokio::test]
async fn test_metrics_unavailable_without_recorder() {
    let (status, body) = send(&test_app(), "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

// -- Wallets ------------------------------------------------------------------

#[tokio::test]
async fn test_create_and_get_wallet() {
    let app = test_app();
    let id = create_wallet(&app, true).await;
    let (status, body) = send(&app, "GET", &format!("/v1/wallets/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "main");
    assert_eq!(body["invoice_requires_successful_payment"], true);
}

#[tokio::test]
async fn test_get_unknown_wallet_returns_404() {
    let uri = format!("/v1/wallets/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&test_app(), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_create_wallet_blank_name_returns_422() {
    let (status, _) = send(&test_app(), "POST", "/v1/wallets", Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_json_returns_400() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/wallets")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- Reconciliation -------------------------------------------------------------

#[tokio::test]
async fn test_reconcile_creates_rules() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;

    let (status, body) = put_rules(&app, &wallet, json!([threshold_spec(), interval_spec()])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wallet_id"], wallet.as_str());
    assert_eq!(body["applied_rule_ids"].as_array().unwrap().len(), 2);
    assert_eq!(body["created"].as_array().unwrap().len(), 2);
    assert!(body["terminated"].as_array().unwrap().is_empty());

    let rules = body["recurring_transaction_rules"].as_array().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0]["method"], "fixed");
    assert_eq!(rules[0]["paid_credits"], "5");
    assert_eq!(rules[1]["interval"], "monthly");
}

#[tokio::test]
async fn test_reconcile_updates_and_terminates() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;

    let (_, first) = put_rules(&app, &wallet, json!([threshold_spec(), interval_spec()])).await;
    let kept = first["applied_rule_ids"][0].as_str().unwrap().to_string();
    let dropped = first["applied_rule_ids"][1].as_str().unwrap().to_string();

    let (status, body) = put_rules(
        &app,
        &wallet,
        json!([{ "lago_id": kept, "trigger": "threshold", "threshold_credits": "25" }]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], json!([kept]));
    assert_eq!(body["terminated"], json!([dropped]));
    assert_eq!(body["recurring_transaction_rules"][0]["threshold_credits"], "25");

    let (status, all) = send(
        &app,
        "GET",
        &format!("/v1/wallets/{wallet}/recurring_transaction_rules?status=terminated"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let terminated = all["recurring_transaction_rules"].as_array().unwrap();
    assert_eq!(terminated.len(), 1);
    assert_eq!(terminated[0]["lago_id"], dropped.as_str());
    assert_eq!(terminated[0]["status"], "terminated");
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;

    let (_, first) = put_rules(&app, &wallet, json!([threshold_spec()])).await;
    let id = first["applied_rule_ids"][0].as_str().unwrap().to_string();
    let mut spec = threshold_spec();
    spec["lago_id"] = json!(id);

    let (_, second) = put_rules(&app, &wallet, json!([spec.clone()])).await;
    let (_, third) = put_rules(&app, &wallet, json!([spec])).await;
    assert_eq!(second["applied_rule_ids"], json!([id]));
    assert!(third["terminated"].as_array().unwrap().is_empty());
    assert!(third["created"].as_array().unwrap().is_empty());
    assert_eq!(
        second["recurring_transaction_rules"],
        third["recurring_transaction_rules"]
    );
}

#[tokio::test]
async fn test_new_rules_inherit_wallet_invoice_flag() {
    let app = test_app();
    let wallet = create_wallet(&app, true).await;

    let mut explicit = threshold_spec();
    explicit["invoice_requires_successful_payment"] = json!(false);
    let (_, body) = put_rules(&app, &wallet, json!([threshold_spec(), explicit])).await;

    let rules = body["recurring_transaction_rules"].as_array().unwrap();
    assert_eq!(rules[0]["invoice_requires_successful_payment"], true);
    assert_eq!(rules[1]["invoice_requires_successful_payment"], false);
}

#[tokio::test]
async fn test_empty_list_terminates_everything() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;
    put_rules(&app, &wallet, json!([threshold_spec(), interval_spec()])).await;

    let (status, body) = put_rules(&app, &wallet, json!([])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["terminated"].as_array().unwrap().len(), 2);
    assert!(body["recurring_transaction_rules"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_spec_returns_422_with_position() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;
    put_rules(&app, &wallet, json!([threshold_spec()])).await;

    let (status, body) = put_rules(
        &app,
        &wallet,
        json!([threshold_spec(), { "trigger": "interval" }]),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"], json!({ "index": 1, "field": "interval" }));

    // Nothing was applied: the original rule is still the only active one.
    let (_, listed) = send(
        &app,
        "GET",
        &format!("/v1/wallets/{wallet}/recurring_transaction_rules"),
        None,
    )
    .await;
    assert_eq!(listed["recurring_transaction_rules"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_trigger_returns_422() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;
    let (status, _) = put_rules(&app, &wallet, json!([{ "trigger": "manual" }])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_reconcile_unknown_wallet_returns_404() {
    let app = test_app();
    let (status, _) = put_rules(&app, &uuid::Uuid::new_v4().to_string(), json!([])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_status_filter_returns_422() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;
    let (status, _) = send(
        &app,
        "GET",
        &format!("/v1/wallets/{wallet}/recurring_transaction_rules?status=archived"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_audit_trail_requires_database() {
    let app = test_app();
    let wallet = create_wallet(&app, false).await;
    let (status, _) = send(&app, "GET", &format!("/v1/wallets/{wallet}/audit_events"), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// -- Authentication -------------------------------------------------------------

#[tokio::test]
async fn test_auth_required_for_api_routes() {
    let app = test_app_with_auth("s3cret");
    let (status, body) = send(&app, "POST", "/v1/wallets", Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_accepts_bearer_token() {
    let app = test_app_with_auth("s3cret");
    let request = Request::builder()
        .method("POST")
        .uri("/v1/wallets")
        .header("authorization", "Bearer s3cret")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_health_bypasses_auth() {
    let app = test_app_with_auth("s3cret");
    let (status, _) = send(&app, "GET", "/health/liveness", None).await;
    assert_eq!(status, StatusCode::OK);
}

// -- OpenAPI --------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_spec_served() {
    let (status, body) = send(&test_app(), "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/wallets/{wallet_id}/recurring_transaction_rules"].is_object());
}
