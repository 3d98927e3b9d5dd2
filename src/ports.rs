//! Boundaries between the use cases and the outside world: the document
//! store, the account store, the spreadsheet log, the invoice provider and the
//! identity provider.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::domain::{OrderNumber, PaymentMethod, Transaction, TransactionStatus, User};
use crate::identity::{AuthSession, IdentityError};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("order number already exists: {0}")]
    DuplicateOrderNumber(String),
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::DuplicateOrderNumber(db.message().to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
}

/// Published after every committed write so live views can refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionChange {
    pub kind: ChangeKind,
    pub transaction_id: Uuid,
    pub order_number: OrderNumber,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

impl TransactionChange {
    pub fn of(kind: ChangeKind, tx: &Transaction) -> Self {
        Self {
            kind,
            transaction_id: tx.id,
            order_number: tx.order_number.clone(),
            status: tx.status,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn ping(&self) -> RepositoryResult<()>;
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;
    async fn find_by_order_number(
        &self,
        order_number: &OrderNumber,
    ) -> RepositoryResult<Option<Transaction>>;
    /// Atomic single-document status write; concurrent writers are
    /// last-write-wins.
    async fn update_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> RepositoryResult<Transaction>;
    async fn update_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
    ) -> RepositoryResult<Transaction>;
    /// Every transaction, newest first.
    async fn list_all(&self) -> RepositoryResult<Vec<Transaction>>;
    /// One user's transactions, newest first.
    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Transaction>>;
    fn subscribe(&self) -> broadcast::Receiver<TransactionChange>;
}

/// Sign-in record behind a [`User`]. `password_hash` is a PHC string.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub user: User,
    pub password_hash: String,
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with [`RepositoryError::DuplicateEmail`] when the email is taken.
    async fn create_account(&self, account: &Account) -> RepositoryResult<()>;
    async fn find_account(&self, email: &str) -> RepositoryResult<Option<Account>>;
    /// Sets the admin claim on a stored account.
    async fn grant_admin(&self, email: &str) -> RepositoryResult<User>;
}

#[derive(Error, Debug)]
pub enum SheetLogError {
    #[error("sheet logging request failed: {0}")]
    Request(String),
    #[error("sheet logging endpoint answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait SheetLogger: Send + Sync {
    async fn log_transaction(&self, transaction_id: Uuid) -> Result<(), SheetLogError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRequest {
    pub price_amount: BigDecimal,
    pub price_currency: String,
    pub order_id: OrderNumber,
    pub order_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: Option<String>,
    pub invoice_url: String,
}

#[derive(Error, Debug)]
pub enum InvoiceError {
    #[error("HTTP request failed: {0}")]
    Request(String),
    #[error("invoice provider answered {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid response from invoice provider: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, InvoiceError>;

    /// "closed" while calls are let through, "open" while they are refused.
    fn circuit_state(&self) -> &'static str {
        "closed"
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;
    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;
    /// Resolves a session token into the user it was issued for.
    async fn verify(&self, token: &str) -> Result<User, IdentityError>;
    /// Grants the admin claim to `email`. Only admins may call this.
    async fn grant_admin(&self, actor: &User, email: &str) -> Result<User, IdentityError>;
    /// Push-based view of a user: updated on claim changes, `None` once
    /// the user signs out.
    async fn watch(&self, user_id: &str) -> watch::Receiver<Option<User>>;
}
