use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::domain::{CheckoutFlow, PaymentMethod, RecipientDetails};
use crate::error::AppError;
use crate::middleware::auth::{Lang, MaybeSession, Session};
use crate::use_cases::PaymentOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub destination: String,
    pub send_amount: u32,
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientRequest {
    pub full_name: String,
    pub id_number: String,
    pub email: String,
    pub whatsapp_phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayResponse {
    pub flow: CheckoutFlow,
    pub outcome: PaymentOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_log_error: Option<String>,
}

pub async fn current(State(state): State<AppState>, session: Session) -> Json<CheckoutFlow> {
    Json(state.checkout.current(&session.user).await)
}

/// Unauthenticated callers get 401 and no session is created.
pub async fn submit_quote(
    State(state): State<AppState>,
    Lang(locale): Lang,
    MaybeSession(session): MaybeSession,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<CheckoutFlow>, AppError> {
    let user = session.as_ref().map(|s| &s.user);
    let flow = state
        .checkout
        .submit_quote(user, &body.destination, body.send_amount)
        .await
        .map_err(|e| AppError::from_checkout(e, locale))?;
    Ok(Json(flow))
}

pub async fn accept_terms(
    State(state): State<AppState>,
    Lang(locale): Lang,
    session: Session,
    Json(body): Json<AcceptRequest>,
) -> Result<Json<CheckoutFlow>, AppError> {
    let flow = state
        .checkout
        .accept_terms(&session.user, body.accepted)
        .await
        .map_err(|e| AppError::from_checkout(e, locale))?;
    Ok(Json(flow))
}

pub async fn submit_recipient(
    State(state): State<AppState>,
    Lang(locale): Lang,
    session: Session,
    Json(body): Json<RecipientRequest>,
) -> Result<Json<CheckoutFlow>, AppError> {
    let recipient = RecipientDetails::new(
        &body.full_name,
        &body.id_number,
        &body.email,
        &body.whatsapp_phone,
    )
    .map_err(|e| AppError::validation(&e, locale))?;

    let flow = state
        .checkout
        .submit_recipient(&session.user, recipient)
        .await
        .map_err(|e| AppError::from_checkout(e, locale))?;
    Ok(Json(flow))
}

pub async fn pay(
    State(state): State<AppState>,
    Lang(locale): Lang,
    session: Session,
    Json(body): Json<PayRequest>,
) -> Result<Json<PayResponse>, AppError> {
    let method: PaymentMethod = body
        .payment_method
        .parse()
        .map_err(|e| AppError::validation(&e, locale))?;

    let report = state
        .checkout
        .pay(&session.user, method)
        .await
        .map_err(|e| AppError::from_checkout(e, locale))?;

    Ok(Json(PayResponse {
        flow: report.flow,
        outcome: report.outcome,
        sheet_log_error: report.sheet_log_error,
    }))
}

pub async fn show_history(State(state): State<AppState>, session: Session) -> Json<CheckoutFlow> {
    Json(state.checkout.show_history(&session.user).await)
}

pub async fn cancel(State(state): State<AppState>, session: Session) -> Json<CheckoutFlow> {
    Json(state.checkout.cancel(&session.user).await)
}
