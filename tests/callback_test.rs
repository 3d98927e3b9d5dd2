mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{spawn_app, TestApp, TestOptions, SHEET_API_KEY};
use remesa_core::domain::TransactionStatus;
use remesa_core::nowpayments::ipn::{self, SIGNATURE_HEADER};
use remesa_core::ports::TransactionRepository;
use serde_json::{json, Value};
use tower::ServiceExt;

const IPN_SECRET: &str = "ipn-test-secret";

/// Runs a Crypto checkout against a mocked invoice API and returns the
/// pending order number.
async fn pending_crypto_order(app: &TestApp, token: &str) -> String {
    app.reach_checkout(token, 100).await;
    let (status, body) = app
        .post("/checkout/pay", Some(token), json!({ "paymentMethod": "Crypto" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["flow"]["orderNumber"].as_str().unwrap().to_string()
}

async fn invoice_server() -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/invoice")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "inv-1", "invoice_url": "https://nowpayments.io/payment/?iid=1"}"#)
        .create_async()
        .await;
    server
}

async fn send_ipn(app: &TestApp, payload: &Value, signature: Option<&str>) -> StatusCode {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/payments/nowpayments/callback")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    let request = builder.body(Body::from(payload.to_string())).unwrap();
    app.router.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_finished_callback_is_idempotent() {
    let server = invoice_server().await;
    let app = spawn_app(TestOptions {
        invoice_api_url: Some(server.url()),
        ..Default::default()
    });
    let token = app.sign_up("ana@example.com").await;
    let order = pending_crypto_order(&app, &token).await;
    let mut changes = app.repository.subscribe();

    let payload = json!({ "order_id": order, "payment_status": "finished" });
    let (status, first) = app
        .post("/payments/nowpayments/callback", None, payload.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["applied"], true);

    let (status, second) = app
        .post("/payments/nowpayments/callback", None, payload)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["applied"], false);

    let all = app.repository.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, TransactionStatus::InProgress);

    // One change for the first delivery only.
    assert!(changes.try_recv().is_ok());
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn test_intermediate_callback_statuses_are_acknowledged_only() {
    let server = invoice_server().await;
    let app = spawn_app(TestOptions {
        invoice_api_url: Some(server.url()),
        ..Default::default()
    });
    let token = app.sign_up("ana@example.com").await;
    let order = pending_crypto_order(&app, &token).await;

    let (status, body) = app
        .post(
            "/payments/nowpayments/callback",
            None,
            json!({ "order_id": order, "payment_status": "confirming" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], false);

    let all = app.repository.list_all().await.unwrap();
    assert_eq!(all[0].status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_callback_never_regresses_delivered_order() {
    let server = invoice_server().await;
    let app = spawn_app(TestOptions {
        invoice_api_url: Some(server.url()),
        ..Default::default()
    });
    let token = app.sign_up("ana@example.com").await;
    let order = pending_crypto_order(&app, &token).await;

    let (status, _) = app
        .post(
            "/sheets/status",
            Some(SHEET_API_KEY),
            json!({ "orderNumber": order, "newStatus": "Entregado" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/payments/nowpayments/callback",
            None,
            json!({ "order_id": order, "payment_status": "expired" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], false);
    assert_eq!(
        app.repository.list_all().await.unwrap()[0].status,
        TransactionStatus::Delivered
    );
}

#[tokio::test]
async fn test_callback_for_unknown_order_is_not_found() {
    let app = spawn_app(TestOptions::default());

    let (status, _) = app
        .post(
            "/payments/nowpayments/callback",
            None,
            json!({ "order_id": "RM-DOESNOTEXIST", "payment_status": "finished" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_callback_missing_fields_is_bad_request() {
    let app = spawn_app(TestOptions::default());

    let (status, _) = app
        .post(
            "/payments/nowpayments/callback",
            None,
            json!({ "payment_status": "finished" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_callbacks_are_verified_when_secret_is_set() {
    let server = invoice_server().await;
    let app = spawn_app(TestOptions {
        invoice_api_url: Some(server.url()),
        ipn_secret: Some(IPN_SECRET.to_string()),
        ..Default::default()
    });
    let token = app.sign_up("ana@example.com").await;
    let order = pending_crypto_order(&app, &token).await;

    let payload = json!({
        "payment_id": 5077125051u64,
        "payment_status": "finished",
        "order_id": order,
        "pay_currency": "btc"
    });

    assert_eq!(send_ipn(&app, &payload, None).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
        send_ipn(&app, &payload, Some("deadbeef")).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.repository.list_all().await.unwrap()[0].status,
        TransactionStatus::Pending
    );

    let signature = ipn::sign(IPN_SECRET, &payload).unwrap();
    assert_eq!(send_ipn(&app, &payload, Some(&signature)).await, StatusCode::OK);
    assert_eq!(
        app.repository.list_all().await.unwrap()[0].status,
        TransactionStatus::InProgress
    );
}

#[tokio::test]
async fn test_sheet_webhook_requires_api_key() {
    let app = spawn_app(TestOptions::default());

    let body = json!({ "orderNumber": "RM-1", "newStatus": "Completado" });
    let (status, _) = app.post("/sheets/status", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/sheets/status", Some("wrong-key"), body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sheet_webhook_is_idempotent() {
    let server = invoice_server().await;
    let app = spawn_app(TestOptions {
        invoice_api_url: Some(server.url()),
        ..Default::default()
    });
    let token = app.sign_up("ana@example.com").await;
    let order = pending_crypto_order(&app, &token).await;

    let body = json!({ "orderNumber": order, "newStatus": "Completado" });
    let (status, first) = app
        .post("/sheets/status", Some(SHEET_API_KEY), body.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["changed"], true);

    let (status, second) = app.post("/sheets/status", Some(SHEET_API_KEY), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["changed"], false);

    assert_eq!(
        app.repository.list_all().await.unwrap()[0].status,
        TransactionStatus::Completed
    );
}

#[tokio::test]
async fn test_sheet_webhook_rejects_missing_fields_and_unknown_status() {
    let app = spawn_app(TestOptions::default());

    let (status, _) = app
        .post(
            "/sheets/status",
            Some(SHEET_API_KEY),
            json!({ "orderNumber": "RM-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/sheets/status",
            Some(SHEET_API_KEY),
            json!({ "orderNumber": "RM-1", "newStatus": "Perdido" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
