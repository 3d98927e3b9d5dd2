//! Postgres implementation of TransactionRepository.
//!
//! Change events come from the database itself: a trigger publishes every
//! committed insert or update on [`CHANGE_NOTIFY_CHANNEL`], and
//! [`PostgresTransactionRepository::start_change_listener`] relays them to
//! subscribers. Writes made by other processes on the same database show up
//! the same way as local ones.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::{
    OrderNumber, PaymentMethod, RecipientDetails, Transaction, TransactionDetails,
    TransactionStatus,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionChange, TransactionRepository};

use super::CHANGE_CHANNEL_CAPACITY;

pub const CHANGE_NOTIFY_CHANNEL: &str = "transaction_changes";
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(2);

const COLUMNS: &str = "id, order_number, user_id, user_email, payment_method, destination, \
    total, receive_amount, recipient_full_name, recipient_id_number, recipient_email, \
    recipient_whatsapp_phone, status, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
    changes: broadcast::Sender<TransactionChange>,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { pool, changes }
    }

    /// Listens for change notifications and forwards them to `subscribe()`.
    /// The LISTEN is in place before this returns.
    pub async fn start_change_listener(&self) -> RepositoryResult<JoinHandle<()>> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        listener
            .listen(CHANGE_NOTIFY_CHANNEL)
            .await
            .map_err(RepositoryError::from)?;
        tracing::info!(channel = CHANGE_NOTIFY_CHANNEL, "listening for transaction changes");

        let changes = self.changes.clone();
        Ok(tokio::spawn(async move {
            loop {
                match listener.try_recv().await {
                    Ok(Some(notification)) => match parse_change(notification.payload()) {
                        Ok(change) => {
                            // No receivers is fine: nobody is watching the board.
                            let _ = changes.send(change);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "ignoring malformed change notification")
                        }
                    },
                    Ok(None) => {
                        tracing::warn!("change listener reconnected, notifications may have been missed")
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "change listener failed, retrying");
                        tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                    }
                }
            }
        }))
    }

    async fn fetch_many(&self, sql: &str, user_id: Option<&str>) -> RepositoryResult<Vec<Transaction>> {
        let mut query = sqlx::query_as::<_, TransactionRow>(sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            "INSERT INTO transactions ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.id)
            .bind(tx.order_number.as_str())
            .bind(&tx.user_id)
            .bind(&tx.user_email)
            .bind(tx.payment_method.map(|m| m.as_str()))
            .bind(&tx.details.destination)
            .bind(&tx.details.total)
            .bind(&tx.details.receive_amount)
            .bind(&tx.recipient.full_name)
            .bind(&tx.recipient.id_number)
            .bind(&tx.recipient.email)
            .bind(&tx.recipient.whatsapp_phone)
            .bind(tx.status.as_str())
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match RepositoryError::from(e) {
                RepositoryError::DuplicateOrderNumber(_) => {
                    RepositoryError::DuplicateOrderNumber(tx.order_number.to_string())
                }
                other => other,
            })?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn find_by_order_number(
        &self,
        order_number: &OrderNumber,
    ) -> RepositoryResult<Option<Transaction>> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE order_number = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(order_number.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> RepositoryResult<Transaction> {
        let sql = format!(
            "UPDATE transactions SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn update_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
    ) -> RepositoryResult<Transaction> {
        let sql = format!(
            "UPDATE transactions SET payment_method = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(method.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn list_all(&self) -> RepositoryResult<Vec<Transaction>> {
        let sql = format!("SELECT {COLUMNS} FROM transactions ORDER BY created_at DESC, id");
        self.fetch_many(&sql, None).await
    }

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions WHERE user_id = $1 ORDER BY created_at DESC, id"
        );
        self.fetch_many(&sql, Some(user_id)).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TransactionChange> {
        self.changes.subscribe()
    }
}

fn parse_change(payload: &str) -> Result<TransactionChange, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    order_number: String,
    user_id: String,
    user_email: String,
    payment_method: Option<String>,
    destination: String,
    total: bigdecimal::BigDecimal,
    receive_amount: bigdecimal::BigDecimal,
    recipient_full_name: String,
    recipient_id_number: String,
    recipient_email: String,
    recipient_whatsapp_phone: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let status = self
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| RepositoryError::Database(format!("row {}: {}", self.id, e)))?;
        let payment_method = self
            .payment_method
            .as_deref()
            .map(str::parse::<PaymentMethod>)
            .transpose()
            .map_err(|e| RepositoryError::Database(format!("row {}: {}", self.id, e)))?;

        Ok(Transaction {
            id: self.id,
            order_number: OrderNumber::from(self.order_number),
            user_id: self.user_id,
            user_email: self.user_email,
            payment_method,
            details: TransactionDetails {
                destination: self.destination,
                total: self.total,
                receive_amount: self.receive_amount,
            },
            recipient: RecipientDetails {
                full_name: self.recipient_full_name,
                id_number: self.recipient_id_number,
                email: self.recipient_email,
                whatsapp_phone: self.recipient_whatsapp_phone,
            },
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
