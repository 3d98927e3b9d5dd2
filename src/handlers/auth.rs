use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::Session;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .identity
        .sign_up(&credentials.email, &credentials.password)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .identity
        .sign_in(&credentials.email, &credentials.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "sign-in rejected");
            e
        })?;
    Ok(Json(session))
}

pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    state.identity.sign_out(&session.token).await?;
    state.checkout.forget(&session.user.id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(session: Session) -> impl IntoResponse {
    Json(session.user)
}
