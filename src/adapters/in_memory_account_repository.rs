//! In-memory AccountRepository, paired with the in-memory transaction store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::User;
use crate::ports::{Account, AccountRepository, RepositoryError, RepositoryResult};

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create_account(&self, account: &Account) -> RepositoryResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.user.email) {
            return Err(RepositoryError::DuplicateEmail(account.user.email.clone()));
        }
        accounts.insert(account.user.email.clone(), account.clone());
        Ok(())
    }

    async fn find_account(&self, email: &str) -> RepositoryResult<Option<Account>> {
        Ok(self.accounts.read().await.get(email).cloned())
    }

    async fn grant_admin(&self, email: &str) -> RepositoryResult<User> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(email)
            .ok_or_else(|| RepositoryError::NotFound(email.to_string()))?;
        account.user.is_admin = true;
        Ok(account.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str) -> Account {
        Account {
            user: User::new("uid-1", email, false),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        }
    }

    #[tokio::test]
    async fn emails_are_unique() {
        let repo = InMemoryAccountRepository::new();
        repo.create_account(&account("ana@example.com")).await.unwrap();

        assert!(matches!(
            repo.create_account(&account("ana@example.com")).await,
            Err(RepositoryError::DuplicateEmail(_))
        ));
        assert!(repo.find_account("ana@example.com").await.unwrap().is_some());
        assert!(repo.find_account("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grant_admin_updates_the_stored_user() {
        let repo = InMemoryAccountRepository::new();
        repo.create_account(&account("ana@example.com")).await.unwrap();

        let user = repo.grant_admin("ana@example.com").await.unwrap();
        assert!(user.is_admin);
        assert!(
            repo.find_account("ana@example.com")
                .await
                .unwrap()
                .unwrap()
                .user
                .is_admin
        );
        assert!(matches!(
            repo.grant_admin("bob@example.com").await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
