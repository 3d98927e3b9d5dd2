//! Initiate payment use case.
//! Persists the order for a checkout submission, logs it to the CRM sheet and,
//! for redirect methods, obtains a hosted invoice.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{
    OrderNumber, PaymentMethod, Transaction, TransactionDraft, TransactionStatus, User,
};
use crate::ports::{
    InvoiceProvider, InvoiceRequest, RepositoryError, SheetLogger, TransactionRepository,
};
use crate::validation::ValidationError;

/// Order numbers are random; a handful of collisions in a row means
/// something else is wrong.
const MAX_ORDER_NUMBER_ATTEMPTS: usize = 5;

pub const INVOICE_CURRENCY: &str = "usd";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentOutcome {
    Completed,
    #[serde(rename_all = "camelCase")]
    Redirect { invoice_url: String },
}

#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub transaction: Transaction,
    pub outcome: PaymentOutcome,
    /// Set when the CRM row could not be written. The order stands.
    pub sheet_log_error: Option<String>,
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("invoice unavailable for order {order_number}: {reason}")]
    InvoiceUnavailable {
        order_number: OrderNumber,
        reason: String,
    },
    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,
}

impl PaymentError {
    /// Order that was persisted before the failure, if any. A retry of the
    /// same submission must reuse it.
    pub fn persisted_order(&self) -> Option<&OrderNumber> {
        match self {
            PaymentError::InvoiceUnavailable { order_number, .. } => Some(order_number),
            _ => None,
        }
    }
}

/// Use case for dispatching a payment.
pub struct InitiatePayment {
    transaction_repository: Arc<dyn TransactionRepository>,
    sheet_logger: Arc<dyn SheetLogger>,
    invoice_provider: Arc<dyn InvoiceProvider>,
}

impl InitiatePayment {
    pub fn new(
        transaction_repository: Arc<dyn TransactionRepository>,
        sheet_logger: Arc<dyn SheetLogger>,
        invoice_provider: Arc<dyn InvoiceProvider>,
    ) -> Self {
        Self {
            transaction_repository,
            sheet_logger,
            invoice_provider,
        }
    }

    pub async fn execute(
        &self,
        user: &User,
        draft: TransactionDraft,
        method: PaymentMethod,
    ) -> Result<PaymentResult, PaymentError> {
        let details = draft
            .details
            .ok_or_else(|| ValidationError::new("details", "transaction details are missing"))?;
        details.validate()?;
        let recipient = draft
            .recipient
            .ok_or_else(|| ValidationError::new("recipient", "recipient details are missing"))?;
        recipient.validate()?;

        let candidate = Transaction::new(
            user,
            draft
                .order_number
                .clone()
                .unwrap_or_else(OrderNumber::generate),
            method,
            details,
            recipient,
        );

        let (transaction, created) = match draft.order_number {
            Some(order_number) => self.persist_reserved(user, &order_number, candidate).await?,
            None => (self.persist_fresh(candidate).await?, true),
        };

        let mut sheet_log_error = None;
        if created {
            if let Err(e) = self.sheet_logger.log_transaction(transaction.id).await {
                tracing::warn!(
                    transaction_id = %transaction.id,
                    order_number = %transaction.order_number,
                    error = %e,
                    "failed to log transaction to sheet"
                );
                sheet_log_error = Some(e.to_string());
            }
        }

        if !method.is_redirect() {
            tracing::info!(
                transaction_id = %transaction.id,
                order_number = %transaction.order_number,
                method = %method,
                "payment completed"
            );
            return Ok(PaymentResult {
                transaction,
                outcome: PaymentOutcome::Completed,
                sheet_log_error,
            });
        }

        let request = InvoiceRequest {
            price_amount: transaction.details.total.clone(),
            price_currency: INVOICE_CURRENCY.to_string(),
            order_id: transaction.order_number.clone(),
            order_description: format!(
                "Money transfer {} to {}",
                transaction.order_number, transaction.details.destination
            ),
        };

        match self.invoice_provider.create_invoice(&request).await {
            Ok(invoice) => Ok(PaymentResult {
                transaction,
                outcome: PaymentOutcome::Redirect {
                    invoice_url: invoice.invoice_url,
                },
                sheet_log_error,
            }),
            Err(e) => {
                tracing::warn!(
                    order_number = %transaction.order_number,
                    error = %e,
                    "invoice creation failed, order left pending"
                );
                Err(PaymentError::InvoiceUnavailable {
                    order_number: transaction.order_number,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// The submission already holds an order number. Reuse the stored order
    /// when it belongs to this user; otherwise store the candidate under it.
    async fn persist_reserved(
        &self,
        user: &User,
        order_number: &OrderNumber,
        candidate: Transaction,
    ) -> Result<(Transaction, bool), PaymentError> {
        let method = candidate.payment_method.unwrap_or(PaymentMethod::Card);

        match self
            .transaction_repository
            .find_by_order_number(order_number)
            .await?
        {
            Some(existing) if existing.is_owned_by(user) => {
                Ok((self.reuse(existing, method).await?, false))
            }
            Some(_) => {
                tracing::warn!(%order_number, "reserved order number taken by another user");
                Ok((self.persist_fresh(renumbered(candidate)).await?, true))
            }
            None => match self.transaction_repository.insert(&candidate).await {
                Ok(tx) => Ok((tx, true)),
                Err(RepositoryError::DuplicateOrderNumber(_)) => {
                    Ok((self.persist_fresh(renumbered(candidate)).await?, true))
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    async fn reuse(
        &self,
        existing: Transaction,
        method: PaymentMethod,
    ) -> Result<Transaction, PaymentError> {
        tracing::info!(
            order_number = %existing.order_number,
            %method,
            "retrying payment on existing order"
        );

        let mut tx = existing;
        if tx.payment_method != Some(method) {
            tx = self
                .transaction_repository
                .update_payment_method(tx.id, method)
                .await?;
        }
        if !method.is_redirect() && tx.status == TransactionStatus::Pending {
            tx = self
                .transaction_repository
                .update_status(tx.id, method.initial_status())
                .await?;
        }
        Ok(tx)
    }

    async fn persist_fresh(&self, mut candidate: Transaction) -> Result<Transaction, PaymentError> {
        for _ in 0..MAX_ORDER_NUMBER_ATTEMPTS {
            if self
                .transaction_repository
                .find_by_order_number(&candidate.order_number)
                .await?
                .is_some()
            {
                candidate = renumbered(candidate);
                continue;
            }

            match self.transaction_repository.insert(&candidate).await {
                Ok(tx) => return Ok(tx),
                Err(RepositoryError::DuplicateOrderNumber(_)) => {
                    candidate = renumbered(candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(PaymentError::OrderNumberExhausted)
    }
}

fn renumbered(mut tx: Transaction) -> Transaction {
    tx.order_number = OrderNumber::generate();
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryTransactionRepository;
    use crate::domain::{quote, RecipientDetails, TransactionDetails};
    use crate::ports::{Invoice, InvoiceError, SheetLogError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSheet {
        logged: Mutex<Vec<Uuid>>,
        fail: bool,
    }

    #[async_trait]
    impl SheetLogger for RecordingSheet {
        async fn log_transaction(&self, transaction_id: Uuid) -> Result<(), SheetLogError> {
            self.logged.lock().unwrap().push(transaction_id);
            if self.fail {
                Err(SheetLogError::Request("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct FakeInvoices {
        fail: bool,
        requests: Mutex<Vec<InvoiceRequest>>,
    }

    impl FakeInvoices {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InvoiceProvider for FakeInvoices {
        async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, InvoiceError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(InvoiceError::Rejected {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            Ok(Invoice {
                id: Some("inv-1".to_string()),
                invoice_url: format!("https://pay.example/{}", request.order_id),
            })
        }
    }

    struct Harness {
        repo: Arc<InMemoryTransactionRepository>,
        sheet: Arc<RecordingSheet>,
        invoices: Arc<FakeInvoices>,
        use_case: InitiatePayment,
    }

    fn harness(sheet_fails: bool, invoice_fails: bool) -> Harness {
        let repo = Arc::new(InMemoryTransactionRepository::new());
        let sheet = Arc::new(RecordingSheet {
            fail: sheet_fails,
            ..Default::default()
        });
        let invoices = Arc::new(FakeInvoices::new(invoice_fails));
        let use_case = InitiatePayment::new(repo.clone(), sheet.clone(), invoices.clone());
        Harness {
            repo,
            sheet,
            invoices,
            use_case,
        }
    }

    fn user() -> User {
        User::new("uid-1", "ana@example.com", false)
    }

    fn draft(order_number: Option<OrderNumber>) -> TransactionDraft {
        TransactionDraft {
            details: Some(TransactionDetails::from_quote(
                "La Habana",
                &quote(200).unwrap(),
            )),
            recipient: Some(
                RecipientDetails::new(
                    "Maria Perez",
                    "85010112345",
                    "maria@example.com",
                    "+5355512345",
                )
                .unwrap(),
            ),
            order_number,
        }
    }

    #[tokio::test]
    async fn card_payment_persists_in_progress_and_logs() {
        let h = harness(false, false);
        let result = h.use_case.execute(&user(), draft(None), PaymentMethod::Card).await.unwrap();

        assert_eq!(result.outcome, PaymentOutcome::Completed);
        assert_eq!(result.transaction.status, TransactionStatus::InProgress);
        assert_eq!(result.transaction.user_id, "uid-1");
        assert!(result.sheet_log_error.is_none());
        assert_eq!(*h.sheet.logged.lock().unwrap(), vec![result.transaction.id]);
        assert!(h.invoices.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn crypto_payment_redirects_with_the_total() {
        let h = harness(false, false);
        let reserved = OrderNumber::generate();
        let result = h
            .use_case
            .execute(&user(), draft(Some(reserved.clone())), PaymentMethod::Crypto)
            .await
            .unwrap();

        assert_eq!(result.transaction.status, TransactionStatus::Pending);
        assert_eq!(result.transaction.order_number, reserved);
        assert_eq!(
            result.outcome,
            PaymentOutcome::Redirect {
                invoice_url: format!("https://pay.example/{}", reserved)
            }
        );

        let requests = h.invoices.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].price_amount, bigdecimal::BigDecimal::from(240));
        assert_eq!(requests[0].price_currency, "usd");
        assert_eq!(requests[0].order_id, reserved);
    }

    #[tokio::test]
    async fn sheet_failure_does_not_roll_back() {
        let h = harness(true, false);
        let result = h.use_case.execute(&user(), draft(None), PaymentMethod::PayPal).await.unwrap();

        assert!(result.sheet_log_error.is_some());
        assert_eq!(h.repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_recipient_writes_nothing() {
        let h = harness(false, false);
        let mut incomplete = draft(None);
        incomplete.recipient = None;

        let err = h
            .use_case
            .execute(&user(), incomplete, PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert!(h.repo.list_all().await.unwrap().is_empty());
        assert!(h.sheet.logged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invoice_failure_keeps_the_order_and_retry_reuses_it() {
        let h = harness(false, true);
        let reserved = OrderNumber::generate();

        let err = h
            .use_case
            .execute(&user(), draft(Some(reserved.clone())), PaymentMethod::Crypto)
            .await
            .unwrap_err();
        assert_eq!(err.persisted_order(), Some(&reserved));

        let stored = h.repo.list_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, TransactionStatus::Pending);

        // Same submission retried with a card.
        let retried = h
            .use_case
            .execute(&user(), draft(Some(reserved.clone())), PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(retried.transaction.id, stored[0].id);
        assert_eq!(retried.transaction.payment_method, Some(PaymentMethod::Card));
        assert_eq!(retried.transaction.status, TransactionStatus::InProgress);
        assert_eq!(h.repo.list_all().await.unwrap().len(), 1);
        assert_eq!(h.sheet.logged.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reserved_number_owned_by_someone_else_is_replaced() {
        let h = harness(false, false);
        let reserved = OrderNumber::generate();
        let other = User::new("uid-2", "bob@example.com", false);
        h.use_case
            .execute(&other, draft(Some(reserved.clone())), PaymentMethod::Card)
            .await
            .unwrap();

        let mine = h
            .use_case
            .execute(&user(), draft(Some(reserved.clone())), PaymentMethod::Card)
            .await
            .unwrap();
        assert_ne!(mine.transaction.order_number, reserved);
        assert_eq!(mine.transaction.user_id, "uid-1");
        assert_eq!(h.repo.list_all().await.unwrap().len(), 2);
    }
}
