use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use super::{AuthSession, Claims, IdentityError};
use crate::domain::User;
use crate::ports::{Account, AccountRepository, IdentityProvider, RepositoryError};
use crate::validation::{sanitize_string, validate_email, validate_password};

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Identity provider over an [`AccountRepository`]. Passwords are stored as
/// argon2 hashes and sessions are HS256 tokens signed with the configured
/// secret; the admin claim is baked into each token at issue time.
pub struct LocalIdentityProvider {
    secret: Vec<u8>,
    token_ttl: Duration,
    bootstrap_admins: HashSet<String>,
    accounts: Arc<dyn AccountRepository>,
    /// Signed-out token ids, kept until the token would have expired anyway.
    revoked: RwLock<HashMap<String, usize>>,
    watchers: RwLock<HashMap<String, watch::Sender<Option<User>>>>,
}

impl LocalIdentityProvider {
    pub fn new(secret: impl Into<Vec<u8>>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            bootstrap_admins: HashSet::new(),
            accounts,
            revoked: RwLock::new(HashMap::new()),
            watchers: RwLock::new(HashMap::new()),
        }
    }

    /// Accounts with one of these emails receive the admin claim.
    pub fn with_bootstrap_admins<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bootstrap_admins = emails
            .into_iter()
            .map(|e| normalize_email(e.as_ref()))
            .collect();
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    fn issue(&self, user: &User) -> Result<AuthSession, IdentityError> {
        let now = Utc::now();
        let expires_at = (now + self.token_ttl).timestamp() as usize;
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            iat: now.timestamp() as usize,
            exp: expires_at,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| IdentityError::Token(e.to_string()))?;

        Ok(AuthSession {
            token,
            user: user.clone(),
            expires_at,
        })
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, IdentityError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::ExpiredToken,
            _ => IdentityError::InvalidToken,
        })
    }

    async fn publish(&self, user_id: &str, user: Option<User>) {
        let mut watchers = self.watchers.write().await;
        watchers
            .entry(user_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(user);
        // Signed-out users nobody is watching need no channel.
        watchers.retain(|_, sender| sender.receiver_count() > 0 || sender.borrow().is_some());
    }
}

fn normalize_email(email: &str) -> String {
    sanitize_string(email).to_lowercase()
}

/// Same email, same id: order history stays attached to the address.
fn user_id_for(email: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("mailto:{}", email).as_bytes()).to_string()
}

async fn hash_password(password: &str) -> Result<String, IdentityError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| IdentityError::PasswordHash(e.to_string()))
    })
    .await
    .map_err(|e| IdentityError::PasswordHash(e.to_string()))?
}

async fn verify_password(password: &str, stored: String) -> Result<bool, IdentityError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash =
            PasswordHash::new(&stored).map_err(|e| IdentityError::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .map_err(|e| IdentityError::PasswordHash(e.to_string()))?
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let email = normalize_email(email);
        validate_email("email", &email)?;
        validate_password(password)?;

        let account = Account {
            user: User::new(
                user_id_for(&email),
                email.clone(),
                self.bootstrap_admins.contains(&email),
            ),
            password_hash: hash_password(password).await?,
        };
        self.accounts
            .create_account(&account)
            .await
            .map_err(|e| match e {
                RepositoryError::DuplicateEmail(_) => IdentityError::EmailAlreadyInUse,
                other => IdentityError::Store(other),
            })?;

        let user = account.user;
        tracing::info!(user_id = %user.id, is_admin = user.is_admin, "account created");
        self.publish(&user.id, Some(user.clone())).await;
        self.issue(&user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let email = normalize_email(email);
        let account = self
            .accounts
            .find_account(&email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;
        if !verify_password(password, account.password_hash).await? {
            return Err(IdentityError::InvalidCredentials);
        }

        let mut user = account.user;
        if !user.is_admin && self.bootstrap_admins.contains(&email) {
            user = self.accounts.grant_admin(&email).await?;
            tracing::info!(user_id = %user.id, "bootstrap admin claim applied");
        }

        self.publish(&user.id, Some(user.clone())).await;
        self.issue(&user)
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let claims = self.decode_claims(token)?;
        {
            let now = Utc::now().timestamp() as usize;
            let mut revoked = self.revoked.write().await;
            revoked.retain(|_, exp| *exp > now);
            revoked.insert(claims.jti, claims.exp);
        }
        self.publish(&claims.sub, None).await;
        tracing::info!(user_id = %claims.sub, "signed out");
        Ok(())
    }

    async fn verify(&self, token: &str) -> Result<User, IdentityError> {
        let claims = self.decode_claims(token)?;
        if self.revoked.read().await.contains_key(&claims.jti) {
            return Err(IdentityError::Revoked);
        }
        Ok(claims.user())
    }

    async fn grant_admin(&self, actor: &User, email: &str) -> Result<User, IdentityError> {
        if !actor.is_admin {
            return Err(IdentityError::PermissionDenied(
                "only admins can add other admins".to_string(),
            ));
        }

        let email = normalize_email(email);
        let user = self
            .accounts
            .grant_admin(&email)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => IdentityError::UserNotFound(email.clone()),
                other => IdentityError::Store(other),
            })?;

        tracing::info!(granted_by = %actor.id, user_id = %user.id, "admin claim granted");
        self.publish(&user.id, Some(user.clone())).await;
        Ok(user)
    }

    async fn watch(&self, user_id: &str) -> watch::Receiver<Option<User>> {
        self.watchers
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }
}
