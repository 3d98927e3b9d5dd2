#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use remesa_core::adapters::{InMemoryAccountRepository, InMemoryTransactionRepository};
use remesa_core::config::{Config, LogFormat};
use remesa_core::identity::LocalIdentityProvider;
use remesa_core::nowpayments::InvoiceClient;
use remesa_core::ports::SheetLogger;
use remesa_core::sheets::{DisabledSheetLogger, SheetLoggerClient};
use remesa_core::{create_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SHEET_API_KEY: &str = "sheet-test-key";
pub const ADMIN_EMAIL: &str = "admin@example.com";

pub struct TestApp {
    pub router: Router,
    pub repository: Arc<InMemoryTransactionRepository>,
}

#[derive(Default)]
pub struct TestOptions {
    pub invoice_api_url: Option<String>,
    pub sheet_logger_url: Option<String>,
    pub ipn_secret: Option<String>,
}

pub fn test_config(options: &TestOptions) -> Config {
    Config {
        server_port: 0,
        database_url: None,
        jwt_secret: "integration-test-secret".to_string(),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        nowpayments_api_url: options
            .invoice_api_url
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:9".to_string()),
        nowpayments_api_key: "np-test-key".to_string(),
        nowpayments_ipn_secret: options.ipn_secret.clone(),
        ipn_callback_url: Some("https://example.com/payments/nowpayments/callback".to_string()),
        sheet_logger_url: options.sheet_logger_url.clone(),
        sheet_api_key: SHEET_API_KEY.to_string(),
        cors_allowed_origins: vec![],
        log_format: LogFormat::Text,
        log_request_body: false,
    }
}

pub fn spawn_app(options: TestOptions) -> TestApp {
    let config = test_config(&options);
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let identity = Arc::new(
        LocalIdentityProvider::new(
            config.jwt_secret.clone(),
            Arc::new(InMemoryAccountRepository::new()),
        )
        .with_bootstrap_admins(config.admin_emails.clone()),
    );
    let invoices = Arc::new(InvoiceClient::new(
        config.nowpayments_api_url.clone(),
        config.nowpayments_api_key.clone(),
        config.ipn_callback_url.clone(),
    ));
    let sheet_logger: Arc<dyn SheetLogger> = match &config.sheet_logger_url {
        Some(url) => Arc::new(SheetLoggerClient::new(url.clone())),
        None => Arc::new(DisabledSheetLogger),
    };

    let state = AppState::new(
        config,
        repository.clone(),
        identity,
        invoices,
        sheet_logger,
    );

    TestApp {
        router: create_app(state),
        repository,
    }
}

impl TestApp {
    /// Serves the router on an ephemeral local port, for clients that need a
    /// real connection.
    pub async fn serve(&self) -> SocketAddr {
        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(self.router.clone().into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
        };
        (status, value)
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, bearer, Some(body)).await
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, bearer, None).await
    }

    /// Signs up and returns the session token.
    pub async fn sign_up(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/auth/signup",
                None,
                json!({ "email": email, "password": "secret-password" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "sign up failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Walks a fresh session up to the Checkout step.
    pub async fn reach_checkout(&self, token: &str, send_amount: u32) {
        let (status, body) = self
            .post(
                "/checkout/quote",
                Some(token),
                json!({ "destination": "La Habana", "sendAmount": send_amount }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "quote failed: {}", body);
        assert_eq!(body["step"], "Warning");

        let (status, body) = self
            .post("/checkout/accept", Some(token), json!({ "accepted": true }))
            .await;
        assert_eq!(status, StatusCode::OK, "accept failed: {}", body);
        assert_eq!(body["step"], "RecipientForm");

        let (status, body) = self
            .post(
                "/checkout/recipient",
                Some(token),
                json!({
                    "fullName": "Maria Perez",
                    "idNumber": "85010112345",
                    "email": "maria@example.com",
                    "whatsappPhone": "+5355512345"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "recipient failed: {}", body);
        assert_eq!(body["step"], "Checkout");
    }
}
