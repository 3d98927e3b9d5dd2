use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};

use crate::domain::destination::DESTINATIONS;
use crate::domain::quote::{quote, QuoteDisplay, ALLOWED_AMOUNTS};
use crate::domain::Quote;
use crate::error::AppError;
use crate::middleware::auth::Lang;

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub amount: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: Quote,
    pub display: QuoteDisplay,
    pub allowed_amounts: &'static [u32],
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            display: quote.display(),
            quote,
            allowed_amounts: &ALLOWED_AMOUNTS,
        }
    }
}

/// Prices a transfer without touching any session.
pub async fn get_quote(Query(query): Query<QuoteQuery>) -> Result<Json<QuoteResponse>, AppError> {
    let quote = quote(query.amount)?;
    Ok(Json(quote.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationView {
    pub name: &'static str,
    pub delivery_window: String,
}

pub async fn list_destinations(Lang(locale): Lang) -> Json<Vec<DestinationView>> {
    Json(
        DESTINATIONS
            .iter()
            .map(|d| DestinationView {
                name: d.name,
                delivery_window: d.delivery.describe(locale),
            })
            .collect(),
    )
}
