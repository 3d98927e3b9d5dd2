pub mod admin;
pub mod auth;
pub mod checkout;
pub mod export;
pub mod public;
pub mod transactions;
pub mod webhook;
pub mod ws;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::health::{check_health, InvoiceProviderChecker, StoreChecker};
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = check_health(
        StoreChecker::new(state.repository.clone()),
        InvoiceProviderChecker::new(state.invoices.clone()),
        state.started_at,
    )
    .await;

    // Only a store outage makes the service unavailable.
    let status_code = if response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}
