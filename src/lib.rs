pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod i18n;
pub mod identity;
pub mod middleware;
pub mod nowpayments;
pub mod ports;
pub mod services;
pub mod sheets;
pub mod use_cases;
pub mod utils;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::ports::{IdentityProvider, InvoiceProvider, SheetLogger, TransactionRepository};
use crate::services::CheckoutSessions;
use crate::use_cases::{InitiatePayment, UpdateStatus};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: Arc<dyn TransactionRepository>,
    pub identity: Arc<dyn IdentityProvider>,
    pub invoices: Arc<dyn InvoiceProvider>,
    pub checkout: Arc<CheckoutSessions>,
    pub status_updates: Arc<UpdateStatus>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        repository: Arc<dyn TransactionRepository>,
        identity: Arc<dyn IdentityProvider>,
        invoices: Arc<dyn InvoiceProvider>,
        sheet_logger: Arc<dyn SheetLogger>,
    ) -> Self {
        let payments = Arc::new(InitiatePayment::new(
            repository.clone(),
            sheet_logger,
            invoices.clone(),
        ));

        Self {
            config: Arc::new(config),
            status_updates: Arc::new(UpdateStatus::new(repository.clone())),
            checkout: Arc::new(CheckoutSessions::new(payments)),
            repository,
            identity,
            invoices,
            started_at: Instant::now(),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn create_app(state: AppState) -> Router {
    let sheet_routes = Router::new()
        .route("/sheets/status", post(handlers::webhook::sheet_status))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::sheet_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/quote", get(handlers::public::get_quote))
        .route("/destinations", get(handlers::public::list_destinations))
        .route("/auth/signup", post(handlers::auth::sign_up))
        .route("/auth/signin", post(handlers::auth::sign_in))
        .route("/auth/signout", post(handlers::auth::sign_out))
        .route("/auth/me", get(handlers::auth::me))
        .route("/checkout", get(handlers::checkout::current))
        .route("/checkout/quote", post(handlers::checkout::submit_quote))
        .route("/checkout/accept", post(handlers::checkout::accept_terms))
        .route("/checkout/recipient", post(handlers::checkout::submit_recipient))
        .route("/checkout/pay", post(handlers::checkout::pay))
        .route("/checkout/history", post(handlers::checkout::show_history))
        .route("/checkout/cancel", post(handlers::checkout::cancel))
        .route("/transactions", get(handlers::transactions::list_mine))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .route("/admin/transactions", get(handlers::admin::list_transactions))
        .route(
            "/admin/transactions/export",
            get(handlers::export::export_transactions_csv),
        )
        .route("/admin/transactions/live", get(handlers::ws::admin_live))
        .route(
            "/admin/transactions/:id/status",
            post(handlers::admin::update_status),
        )
        .route("/admin/claims", post(handlers::admin::grant_admin))
        .route(
            "/payments/nowpayments/callback",
            post(handlers::webhook::nowpayments_callback),
        )
        .merge(sheet_routes)
        .layer(axum_middleware::from_fn_with_state(
            middleware::request_logger::RequestLogging {
                log_body: state.config.log_request_body,
            },
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .with_state(state)
}
