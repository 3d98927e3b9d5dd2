use axum::{
    extract::State,
    http::{header, header::HeaderValue, HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use csv::Writer;
use serde::Serialize;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::middleware::auth::AdminSession;
use crate::utils::money::round_cents;
use crate::AppState;

/// One CRM spreadsheet row. Column names match the sheet's header row.
#[derive(Serialize)]
struct CrmRow {
    #[serde(rename = "Order Number")]
    order_number: String,
    #[serde(rename = "User")]
    user: String,
    #[serde(rename = "Amount Sent")]
    amount_sent: String,
    #[serde(rename = "Commission")]
    commission: String,
    #[serde(rename = "Total Paid")]
    total_paid: String,
    #[serde(rename = "Recipient")]
    recipient: String,
    #[serde(rename = "Recipient ID")]
    recipient_id: String,
    #[serde(rename = "WhatsApp")]
    whatsapp: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Status")]
    status: String,
}

impl From<&Transaction> for CrmRow {
    fn from(tx: &Transaction) -> Self {
        CrmRow {
            order_number: tx.order_number.to_string(),
            user: tx.user_email.clone(),
            amount_sent: round_cents(&tx.details.receive_amount).to_string(),
            commission: round_cents(&tx.details.commission()).to_string(),
            total_paid: round_cents(&tx.details.total).to_string(),
            recipient: tx.recipient.full_name.clone(),
            recipient_id: tx.recipient.id_number.clone(),
            whatsapp: tx.recipient.whatsapp_phone.clone(),
            date: tx.created_at.to_rfc3339(),
            status: tx.status.to_string(),
        }
    }
}

pub fn to_csv(transactions: &[Transaction]) -> Result<String, AppError> {
    let mut wtr = Writer::from_writer(vec![]);
    for tx in transactions {
        wtr.serialize(CrmRow::from(tx))
            .map_err(|e| AppError::Internal(format!("csv: {}", e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("csv: {}", e)))
}

/// Export every transaction as CSV in the CRM sheet's layout.
pub async fn export_transactions_csv(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let transactions = state.repository.list_all().await?;
    let body = to_csv(&transactions)?;

    let filename = format!("transactions_{}.csv", Utc::now().format("%Y-%m-%d"));
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((StatusCode::OK, headers, body))
}
