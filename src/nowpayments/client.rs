use async_trait::async_trait;
use bigdecimal::ToPrimitive;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::{Invoice, InvoiceError, InvoiceProvider, InvoiceRequest};

/// Body of `POST /v1/invoice`.
#[derive(Debug, Serialize)]
struct CreateInvoiceBody<'a> {
    price_amount: f64,
    price_currency: &'a str,
    order_id: &'a str,
    order_description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipn_callback_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateInvoiceResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    invoice_url: Option<String>,
}

/// HTTP client for the NowPayments invoice API
#[derive(Clone)]
pub struct InvoiceClient {
    client: Client,
    base_url: String,
    api_key: String,
    ipn_callback_url: Option<String>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl InvoiceClient {
    pub fn new(base_url: String, api_key: String, ipn_callback_url: Option<String>) -> Self {
        Self::with_circuit_breaker(base_url, api_key, ipn_callback_url, 3, 60)
    }

    /// Creates a client with a custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        api_key: String,
        ipn_callback_url: Option<String>,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        InvoiceClient {
            client,
            base_url,
            api_key,
            ipn_callback_url,
            circuit_breaker,
        }
    }
}

#[async_trait]
impl InvoiceProvider for InvoiceClient {
    fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, InvoiceError> {
        let price_amount = request.price_amount.to_f64().ok_or_else(|| {
            InvoiceError::InvalidResponse(format!(
                "price {} cannot be sent as a number",
                request.price_amount
            ))
        })?;
        let body = serde_json::to_value(CreateInvoiceBody {
            price_amount,
            price_currency: &request.price_currency,
            order_id: request.order_id.as_str(),
            order_description: &request.order_description,
            ipn_callback_url: self.ipn_callback_url.as_deref(),
        })
        .map_err(|e| InvoiceError::Request(e.to_string()))?;

        let url = format!("{}/v1/invoice", self.base_url.trim_end_matches('/'));
        let client = self.client.clone();
        let api_key = self.api_key.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .header("x-api-key", api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| InvoiceError::Request(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(InvoiceError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }

                let parsed = response
                    .json::<CreateInvoiceResponse>()
                    .await
                    .map_err(|e| InvoiceError::InvalidResponse(e.to_string()))?;
                let invoice_url = parsed
                    .invoice_url
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| {
                        InvoiceError::InvalidResponse("response has no invoice_url".to_string())
                    })?;

                Ok(Invoice {
                    id: parsed.id.map(|id| match id {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    }),
                    invoice_url,
                })
            })
            .await;

        match result {
            Ok(invoice) => {
                tracing::info!(order_id = %request.order_id, "invoice created");
                Ok(invoice)
            }
            Err(FailsafeError::Rejected) => Err(InvoiceError::CircuitBreakerOpen(
                "invoice API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(order_id = %request.order_id, error = %e, "invoice creation failed");
                Err(e)
            }
        }
    }
}
