//! Spreadsheet (CRM) logging.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::ports::{SheetLogError, SheetLogger};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogRequest {
    transaction_id: Uuid,
}

/// Posts `{"transactionId": ...}` to the spreadsheet logging endpoint, which
/// reads the stored transaction and appends a CRM row.
#[derive(Clone)]
pub struct SheetLoggerClient {
    client: Client,
    endpoint: String,
}

impl SheetLoggerClient {
    pub fn new(endpoint: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }
}

#[async_trait]
impl SheetLogger for SheetLoggerClient {
    async fn log_transaction(&self, transaction_id: Uuid) -> Result<(), SheetLogError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&LogRequest { transaction_id })
            .send()
            .await
            .map_err(|e| SheetLogError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetLogError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(%transaction_id, "transaction logged to sheet");
        Ok(())
    }
}

/// Used when no logging endpoint is configured.
#[derive(Clone, Default)]
pub struct DisabledSheetLogger;

#[async_trait]
impl SheetLogger for DisabledSheetLogger {
    async fn log_transaction(&self, transaction_id: Uuid) -> Result<(), SheetLogError> {
        tracing::debug!(%transaction_id, "sheet logging disabled, skipping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn posts_the_transaction_id() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("POST", "/logTransactionToSheet")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "transactionId": id.to_string() }),
            ))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let logger = SheetLoggerClient::new(format!("{}/logTransactionToSheet", server.url()));
        logger.log_transaction(id).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/log")
            .with_status(404)
            .with_body("Transaction not found")
            .create_async()
            .await;

        let logger = SheetLoggerClient::new(format!("{}/log", server.url()));
        match logger.log_transaction(Uuid::new_v4()).await {
            Err(SheetLogError::Rejected { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "Transaction not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn disabled_logger_is_a_no_op() {
        assert!(DisabledSheetLogger
            .log_transaction(Uuid::new_v4())
            .await
            .is_ok());
    }
}
