use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{FlowError, QuoteError};
use crate::i18n::{self, Locale, MessageKey};
use crate::identity::IdentityError;
use crate::ports::RepositoryError;
use crate::services::CheckoutError;
use crate::use_cases::{PaymentError, StatusUpdateError};
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    AuthenticationRequired(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationRequired(_) | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ExternalService(_))
    }

    pub fn validation(err: &ValidationError, locale: Locale) -> Self {
        if err.is_missing_value() {
            AppError::Validation(i18n::format(
                locale,
                MessageKey::FieldRequired,
                &[("field", err.field)],
            ))
        } else {
            AppError::Validation(err.to_string())
        }
    }

    pub fn from_flow(err: FlowError, locale: Locale) -> Self {
        match err {
            FlowError::AuthenticationRequired => AppError::AuthenticationRequired(
                i18n::translate(locale, MessageKey::AuthenticationRequired),
            ),
            FlowError::TermsNotAccepted => {
                AppError::Validation(i18n::translate(locale, MessageKey::TermsNotAccepted))
            }
            FlowError::UnknownDestination(destination) => AppError::Validation(i18n::format(
                locale,
                MessageKey::UnknownDestination,
                &[("destination", destination.as_str())],
            )),
            FlowError::Quote(e) => AppError::Validation(e.to_string()),
            FlowError::Validation(e) => AppError::validation(&e, locale),
            FlowError::PaymentInProgress => {
                AppError::Conflict(i18n::translate(locale, MessageKey::PaymentInProgress))
            }
            e @ (FlowError::InvalidTransition { .. } | FlowError::StalePayment(_)) => {
                AppError::Conflict(e.to_string())
            }
        }
    }

    pub fn from_payment(err: PaymentError, locale: Locale) -> Self {
        match err {
            PaymentError::Validation(e) => AppError::validation(&e, locale),
            PaymentError::Repository(e) => e.into(),
            PaymentError::InvoiceUnavailable { order_number, .. } => {
                AppError::ExternalService(i18n::format(
                    locale,
                    MessageKey::InvoiceUnavailable,
                    &[("order", order_number.as_str())],
                ))
            }
            e @ PaymentError::OrderNumberExhausted => AppError::Internal(e.to_string()),
        }
    }

    pub fn from_checkout(err: CheckoutError, locale: Locale) -> Self {
        match err {
            CheckoutError::Flow(e) => AppError::from_flow(e, locale),
            CheckoutError::Payment(e) => AppError::from_payment(e, locale),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            e @ (RepositoryError::DuplicateOrderNumber(_) | RepositoryError::DuplicateEmail(_)) => {
                AppError::Conflict(e.to_string())
            }
            RepositoryError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::validation(&err, Locale::default())
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        AppError::from_checkout(err, Locale::default())
    }
}

impl From<StatusUpdateError> for AppError {
    fn from(err: StatusUpdateError) -> Self {
        match err {
            e @ StatusUpdateError::Forbidden => AppError::Forbidden(e.to_string()),
            StatusUpdateError::NotFound(what) => {
                AppError::NotFound(format!("transaction {}", what))
            }
            StatusUpdateError::Repository(e) => e.into(),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Validation(e) => e.into(),
            e @ IdentityError::EmailAlreadyInUse => AppError::Conflict(e.to_string()),
            e @ (IdentityError::InvalidCredentials
            | IdentityError::InvalidToken
            | IdentityError::ExpiredToken
            | IdentityError::Revoked) => AppError::Unauthorized(e.to_string()),
            IdentityError::PermissionDenied(msg) => AppError::Forbidden(msg),
            IdentityError::UserNotFound(email) => AppError::NotFound(format!("user {}", email)),
            IdentityError::Store(e) => e.into(),
            IdentityError::Token(msg) | IdentityError::PasswordHash(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}
