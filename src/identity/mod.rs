//! Session tokens and the local identity provider.

mod local;

pub use local::LocalIdentityProvider;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::User;
use crate::ports::RepositoryError;
use crate::validation::ValidationError;

/// Claims carried by a session token. `is_admin` is the admin claim.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

impl Claims {
    pub fn user(&self) -> User {
        User::new(self.sub.clone(), self.email.clone(), self.is_admin)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub user: User,
    pub expires_at: usize,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid session token")]
    InvalidToken,
    #[error("session token expired")]
    ExpiredToken,
    #[error("session was signed out")]
    Revoked,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}
