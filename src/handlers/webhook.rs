use axum::{
    async_trait,
    body::Body,
    extract::{FromRequest, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{OrderNumber, TransactionStatus};
use crate::error::AppError;
use crate::nowpayments::ipn::{self, IpnError, SIGNATURE_HEADER};
use crate::validation::validate_required;
use crate::AppState;

/// Callback body, verified against `x-nowpayments-sig` when an IPN secret is
/// configured.
pub struct VerifiedIpn {
    pub payload: Value,
}

#[async_trait]
impl FromRequest<AppState, Body> for VerifiedIpn {
    type Rejection = WebhookError;

    async fn from_request(req: Request<Body>, state: &AppState) -> Result<Self, Self::Rejection> {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = hyper::body::to_bytes(req.into_body())
            .await
            .map_err(|_| WebhookError::BodyRead)?;
        let payload: Value =
            serde_json::from_slice(&body).map_err(|_| WebhookError::InvalidPayload)?;

        if let Some(secret) = &state.config.nowpayments_ipn_secret {
            let signature = signature.ok_or(WebhookError::Signature(IpnError::MissingSignature))?;
            ipn::verify(secret, &payload, &signature).map_err(WebhookError::Signature)?;
        }

        Ok(VerifiedIpn { payload })
    }
}

#[derive(Debug)]
pub enum WebhookError {
    BodyRead,
    InvalidPayload,
    Signature(IpnError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebhookError::BodyRead => (StatusCode::BAD_REQUEST, "Failed to read request body"),
            WebhookError::InvalidPayload => (StatusCode::BAD_REQUEST, "Invalid callback data"),
            WebhookError::Signature(IpnError::InvalidSecret) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid IPN secret configuration",
            ),
            WebhookError::Signature(_) => {
                (StatusCode::UNAUTHORIZED, "Signature verification failed")
            }
        };

        tracing::warn!("Payment callback rejected: {:?}", self);
        (status, message).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    pub order_id: String,
    pub payment_status: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub received: bool,
    pub applied: bool,
}

/// Payment provider notification. Safe to deliver more than once.
pub async fn nowpayments_callback(
    State(state): State<AppState>,
    VerifiedIpn { payload }: VerifiedIpn,
) -> Result<Json<CallbackAck>, AppError> {
    let callback: PaymentCallback = serde_json::from_value(payload)
        .map_err(|_| AppError::BadRequest("Invalid callback data".to_string()))?;
    validate_required("order_id", &callback.order_id)?;
    validate_required("payment_status", &callback.payment_status)?;

    let order_number = OrderNumber::from(callback.order_id);
    tracing::info!(
        %order_number,
        payment_status = %callback.payment_status,
        "payment callback received"
    );

    let update = state
        .status_updates
        .apply_payment_callback(&order_number, &callback.payment_status)
        .await?;

    Ok(Json(CallbackAck {
        received: true,
        applied: update.map(|u| u.changed).unwrap_or(false),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetStatusRequest {
    pub order_number: Option<String>,
    pub new_status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SheetStatusResponse {
    pub success: bool,
    pub changed: bool,
}

/// Status edits made in the CRM spreadsheet. Behind the sheet API key.
pub async fn sheet_status(
    State(state): State<AppState>,
    Json(body): Json<SheetStatusRequest>,
) -> Result<Json<SheetStatusResponse>, AppError> {
    let (Some(order_number), Some(new_status)) = (body.order_number, body.new_status) else {
        return Err(AppError::BadRequest(
            "Missing orderNumber or newStatus".to_string(),
        ));
    };
    validate_required("orderNumber", &order_number)?;
    let new_status: TransactionStatus = new_status.parse()?;

    let update = state
        .status_updates
        .by_order_number(&OrderNumber::from(order_number), new_status)
        .await?;

    Ok(Json(SheetStatusResponse {
        success: true,
        changed: update.changed,
    }))
}
