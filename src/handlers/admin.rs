use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus, User};
use crate::error::AppError;
use crate::middleware::auth::{AdminSession, Session};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub new_status: TransactionStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeResponse {
    pub success: bool,
    pub changed: bool,
    pub transaction: Transaction,
}

#[derive(Debug, Deserialize)]
pub struct GrantAdminRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct GrantAdminResponse {
    pub message: String,
    pub user: User,
}

/// Every transaction, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.repository.list_all().await?))
}

/// The admin check lives in the use case, so a plain session is enough here.
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChangeRequest>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let update = state
        .status_updates
        .by_admin(&session.user, id, body.new_status)
        .await?;

    Ok(Json(StatusChangeResponse {
        success: true,
        changed: update.changed,
        transaction: update.transaction,
    }))
}

pub async fn grant_admin(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<GrantAdminRequest>,
) -> Result<Json<GrantAdminResponse>, AppError> {
    let user = state
        .identity
        .grant_admin(&session.user, &body.email)
        .await?;

    Ok(Json(GrantAdminResponse {
        message: format!("{} is now an admin", user.email),
        user,
    }))
}
