use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::convert::Infallible;

use crate::domain::User;
use crate::error::AppError;
use crate::i18n::{self, Locale, MessageKey};
use crate::AppState;

/// Reads `Authorization: Bearer <token>`.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Caller's locale: `?lang=` wins over `Accept-Language`; Spanish otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lang(pub Locale);

impl Lang {
    fn from_parts(parts: &Parts) -> Self {
        let from_query = parts.uri.query().and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "lang")
                .map(|(_, v)| Locale::from_tag(&v))
        });
        let locale = from_query.unwrap_or_else(|| {
            parts
                .headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|h| h.to_str().ok())
                .map(Locale::from_tag)
                .unwrap_or_default()
        });
        Lang(locale)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Lang
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Lang::from_parts(parts))
    }
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Lang(locale) = Lang::from_parts(parts);
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::AuthenticationRequired(i18n::translate(
                locale,
                MessageKey::AuthenticationRequired,
            ))
        })?;

        let user = state.identity.verify(token).await?;
        Ok(Session {
            user,
            token: token.to_string(),
        })
    }
}

/// Session when a bearer token is present. A present but invalid token is
/// still rejected.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if bearer_token(parts).is_none() {
            return Ok(MaybeSession(None));
        }
        Session::from_request_parts(parts, state)
            .await
            .map(|s| MaybeSession(Some(s)))
    }
}

/// A session carrying the admin claim.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        if !session.user.is_admin {
            tracing::warn!(user_id = %session.user.id, uri = %parts.uri, "admin route without admin claim");
            return Err(AppError::Forbidden("admin claim required".to_string()));
        }
        Ok(AdminSession(session))
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Compares a presented shared key with the expected one in constant time:
/// both are MACed under the expected key and the tags checked with
/// `verify_slice`.
fn shared_key_matches(expected: &str, presented: &str) -> bool {
    let tag = |value: &str| {
        HmacSha256::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };
    match (tag(expected), tag(presented)) {
        (Ok(reference), Ok(candidate)) => candidate
            .verify_slice(&reference.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

/// Guards the spreadsheet webhook with the shared `SHEET_API_KEY`.
pub async fn sheet_api_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(key) if shared_key_matches(&state.config.sheet_api_key, key) => {
            Ok(next.run(req).await)
        }
        _ => {
            tracing::warn!(uri = %req.uri(), "sheet webhook rejected: bad api key");
            Err(AppError::Unauthorized("invalid api key".to_string()))
        }
    }
}
