use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::middleware::auth::Session;
use crate::AppState;

/// The caller's own transactions, newest first.
pub async fn list_mine(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = state.repository.list_by_user(&session.user.id).await?;
    Ok(Json(transactions))
}

/// Owners and admins only.
pub async fn get_transaction(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state.repository.get_by_id(id).await.map_err(|e| match e {
        crate::ports::RepositoryError::NotFound(_) => {
            AppError::NotFound(format!("Transaction {} not found", id))
        }
        other => other.into(),
    })?;

    if !tx.is_owned_by(&session.user) && !session.user.is_admin {
        return Err(AppError::Forbidden(
            "transaction belongs to another user".to_string(),
        ));
    }
    Ok(Json(tx))
}
