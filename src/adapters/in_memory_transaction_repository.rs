//! In-memory TransactionRepository, used when no database is configured and
//! throughout the tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::{OrderNumber, PaymentMethod, Transaction, TransactionStatus};
use crate::ports::{
    ChangeKind, RepositoryError, RepositoryResult, TransactionChange, TransactionRepository,
};

use super::CHANGE_CHANNEL_CAPACITY;

pub struct InMemoryTransactionRepository {
    transactions: RwLock<HashMap<Uuid, Transaction>>,
    changes: broadcast::Sender<TransactionChange>,
}

impl Default for InMemoryTransactionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            transactions: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn publish(&self, kind: ChangeKind, tx: &Transaction) {
        let _ = self.changes.send(TransactionChange::of(kind, tx));
    }

    async fn modify<F>(&self, id: Uuid, apply: F) -> RepositoryResult<Transaction>
    where
        F: FnOnce(&mut Transaction),
    {
        let updated = {
            let mut transactions = self.transactions.write().await;
            let tx = transactions
                .get_mut(&id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            apply(tx);
            tx.updated_at = Utc::now();
            tx.clone()
        };
        self.publish(ChangeKind::Updated, &updated);
        Ok(updated)
    }
}

fn newest_first(mut list: Vec<Transaction>) -> Vec<Transaction> {
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    list
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }

    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        {
            let mut transactions = self.transactions.write().await;
            if transactions
                .values()
                .any(|existing| existing.order_number == tx.order_number)
            {
                return Err(RepositoryError::DuplicateOrderNumber(
                    tx.order_number.to_string(),
                ));
            }
            transactions.insert(tx.id, tx.clone());
        }
        self.publish(ChangeKind::Created, tx);
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.transactions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_by_order_number(
        &self,
        order_number: &OrderNumber,
    ) -> RepositoryResult<Option<Transaction>> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .find(|tx| &tx.order_number == order_number)
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> RepositoryResult<Transaction> {
        self.modify(id, |tx| tx.status = status).await
    }

    async fn update_payment_method(
        &self,
        id: Uuid,
        method: PaymentMethod,
    ) -> RepositoryResult<Transaction> {
        self.modify(id, |tx| tx.payment_method = Some(method)).await
    }

    async fn list_all(&self) -> RepositoryResult<Vec<Transaction>> {
        let list = self.transactions.read().await.values().cloned().collect();
        Ok(newest_first(list))
    }

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<Transaction>> {
        let list = self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(list))
    }

    fn subscribe(&self) -> broadcast::Receiver<TransactionChange> {
        self.changes.subscribe()
    }
}
