//! Status update use case.
//! Shared by the admin board, the spreadsheet webhook and the payment
//! provider callback. Writing the status a transaction already has is a no-op.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{OrderNumber, Transaction, TransactionStatus, User};
use crate::ports::{RepositoryError, TransactionRepository};

#[derive(Error, Debug)]
pub enum StatusUpdateError {
    #[error("admin claim required")]
    Forbidden,
    #[error("transaction not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for StatusUpdateError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => StatusUpdateError::NotFound(what),
            other => StatusUpdateError::Repository(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub transaction: Transaction,
    pub changed: bool,
}

/// What a payment provider callback asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackEffect {
    Set(TransactionStatus),
    Ignore,
}

/// `finished` moves the order forward; `failed` and `expired` put it back to
/// pending. Anything else (waiting, confirming, partially_paid...) is only
/// acknowledged.
pub fn callback_effect(payment_status: &str) -> CallbackEffect {
    match payment_status.trim() {
        "finished" => CallbackEffect::Set(TransactionStatus::InProgress),
        "failed" | "expired" => CallbackEffect::Set(TransactionStatus::Pending),
        _ => CallbackEffect::Ignore,
    }
}

pub struct UpdateStatus {
    transaction_repository: Arc<dyn TransactionRepository>,
}

impl UpdateStatus {
    pub fn new(transaction_repository: Arc<dyn TransactionRepository>) -> Self {
        Self {
            transaction_repository,
        }
    }

    pub async fn by_admin(
        &self,
        actor: &User,
        transaction_id: Uuid,
        new_status: TransactionStatus,
    ) -> Result<StatusUpdate, StatusUpdateError> {
        if !actor.is_admin {
            tracing::warn!(user_id = %actor.id, %transaction_id, "status update without admin claim");
            return Err(StatusUpdateError::Forbidden);
        }

        let current = self.transaction_repository.get_by_id(transaction_id).await?;
        let update = self.apply(current, new_status).await?;
        if update.changed {
            tracing::info!(
                admin = %actor.id,
                %transaction_id,
                status = %new_status,
                "status updated by admin"
            );
        }
        Ok(update)
    }

    /// Used by the spreadsheet webhook; any status may be set.
    pub async fn by_order_number(
        &self,
        order_number: &OrderNumber,
        new_status: TransactionStatus,
    ) -> Result<StatusUpdate, StatusUpdateError> {
        let current = self.find(order_number).await?;
        self.apply(current, new_status).await
    }

    /// Returns `None` when the callback status is only acknowledged.
    /// Delivered and completed orders are never moved back by the provider.
    pub async fn apply_payment_callback(
        &self,
        order_number: &OrderNumber,
        payment_status: &str,
    ) -> Result<Option<StatusUpdate>, StatusUpdateError> {
        let target = match callback_effect(payment_status) {
            CallbackEffect::Set(status) => status,
            CallbackEffect::Ignore => {
                tracing::debug!(%order_number, payment_status, "callback acknowledged");
                return Ok(None);
            }
        };

        let current = self.find(order_number).await?;
        if current.status.is_terminal() {
            tracing::info!(
                %order_number,
                status = %current.status,
                payment_status,
                "callback ignored for settled order"
            );
            return Ok(Some(StatusUpdate {
                transaction: current,
                changed: false,
            }));
        }

        self.apply(current, target).await.map(Some)
    }

    async fn find(&self, order_number: &OrderNumber) -> Result<Transaction, StatusUpdateError> {
        self.transaction_repository
            .find_by_order_number(order_number)
            .await?
            .ok_or_else(|| StatusUpdateError::NotFound(order_number.to_string()))
    }

    async fn apply(
        &self,
        current: Transaction,
        new_status: TransactionStatus,
    ) -> Result<StatusUpdate, StatusUpdateError> {
        if current.status == new_status {
            return Ok(StatusUpdate {
                transaction: current,
                changed: false,
            });
        }

        let transaction = self
            .transaction_repository
            .update_status(current.id, new_status)
            .await?;
        Ok(StatusUpdate {
            transaction,
            changed: true,
        })
    }
}
