use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::{Transaction, User};
use crate::error::AppError;
use crate::ports::TransactionChange;
use crate::AppState;

/// Pushed to the admin board on connect and after every change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<TransactionChange>,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so the session
/// token travels in the query string.
pub async fn admin_live(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("missing token".to_string()))?;
    let user = state.identity.verify(&token).await?;
    if !user.is_admin {
        tracing::warn!(user_id = %user.id, "live board requested without admin claim");
        return Err(AppError::Forbidden("admin claim required".to_string()));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn snapshot(state: &AppState, change: Option<TransactionChange>) -> Option<String> {
    match state.repository.list_all().await {
        Ok(transactions) => serde_json::to_string(&BoardSnapshot {
            change,
            transactions,
        })
        .map_err(|e| tracing::error!("Failed to serialize snapshot: {}", e))
        .ok(),
        Err(e) => {
            tracing::error!("Failed to load board snapshot: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the first snapshot so no change slips in between.
    let mut rx = state.repository.subscribe();
    let mut claims = Some(state.identity.watch(&user.id).await);

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received text message: {}", text);
                }
                Message::Close(_) => {
                    tracing::info!("Client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        if let Some(initial) = snapshot(&state, None).await {
            if sender.send(Message::Text(initial)).await.is_err() {
                return;
            }
        }

        let mut heartbeat_interval = tokio::time::interval(tokio::time::Duration::from_secs(30));

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        tracing::info!("Client disconnected during heartbeat");
                        break;
                    }
                }
                revoked = admin_revoked(&mut claims) => {
                    if revoked {
                        tracing::info!(user_id = %user.id, "admin session ended, closing board");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
                result = rx.recv() => {
                    let change = match result {
                        Ok(change) => Some(change),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Client lagged behind by {} messages", n);
                            None
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Broadcast channel closed");
                            break;
                        }
                    };

                    // Each push is a fresh ordered snapshot, so a lagged
                    // client is caught up by the next one.
                    if let Some(json) = snapshot(&state, change).await {
                        if sender.send(Message::Text(json)).await.is_err() {
                            tracing::info!("Client disconnected");
                            break;
                        }
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    tracing::info!("WebSocket connection closed");
}

/// Resolves to `true` once the watched user signs out or loses the admin
/// claim. Never resolves once the watcher is gone.
async fn admin_revoked(
    claims: &mut Option<tokio::sync::watch::Receiver<Option<User>>>,
) -> bool {
    let Some(rx) = claims.as_mut() else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_err() {
        *claims = None;
        return false;
    }
    let still_admin = rx.borrow().as_ref().map(|u| u.is_admin).unwrap_or(false);
    !still_admin
}
