//! Postgres implementation of AccountRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::User;
use crate::ports::{Account, AccountRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn create_account(&self, account: &Account) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO accounts (email, user_id, password_hash, is_admin) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&account.user.email)
        .bind(&account.user.id)
        .bind(&account.password_hash)
        .bind(account.user.is_admin)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::DuplicateEmail(account.user.email.clone())
            }
            other => RepositoryError::from(other),
        })?;
        Ok(())
    }

    async fn find_account(&self, email: &str) -> RepositoryResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT email, user_id, password_hash, is_admin FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(AccountRow::into_domain))
    }

    async fn grant_admin(&self, email: &str) -> RepositoryResult<User> {
        let row = sqlx::query_as::<_, AccountRow>(
            "UPDATE accounts SET is_admin = TRUE, updated_at = NOW() WHERE email = $1 \
             RETURNING email, user_id, password_hash, is_admin",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|row| row.into_domain().user)
            .ok_or_else(|| RepositoryError::NotFound(email.to_string()))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    email: String,
    user_id: String,
    password_hash: String,
    is_admin: bool,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            user: User::new(self.user_id, self.email, self.is_admin),
            password_hash: self.password_hash,
        }
    }
}
