mod common;

use std::net::SocketAddr;
use std::time::Duration;

use common::{spawn_app, TestApp, TestOptions, ADMIN_EMAIL};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr, token: &str) -> Result<Socket, WsError> {
    connect_async(format!(
        "ws://{}/admin/transactions/live?token={}",
        addr, token
    ))
    .await
    .map(|(socket, _)| socket)
}

/// Status of a refused handshake.
async fn refused(addr: SocketAddr, token: &str) -> u16 {
    match connect(addr, token).await {
        Err(WsError::Http(response)) => response.status().as_u16(),
        Err(other) => panic!("unexpected handshake error: {}", other),
        Ok(_) => panic!("handshake was accepted"),
    }
}

/// Next board push, skipping heartbeats. `None` once the server closes.
async fn next_push(socket: &mut Socket) -> Option<Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame from the board within 5s");
        match frame {
            Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).unwrap()),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        }
    }
}

async fn card_order(app: &TestApp, email: &str) -> String {
    let token = app.sign_up(email).await;
    app.reach_checkout(&token, 200).await;
    let (_, body) = app
        .post("/checkout/pay", Some(&token), json!({ "paymentMethod": "Card" }))
        .await;
    body["flow"]["receipt"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_live_board_requires_admin_session() {
    let app = spawn_app(TestOptions::default());
    let addr = app.serve().await;
    let customer = app.sign_up("ana@example.com").await;

    assert_eq!(refused(addr, &customer).await, 403);
    assert_eq!(refused(addr, "").await, 401);
    assert_eq!(refused(addr, "not-a-token").await, 401);
}

#[tokio::test]
async fn test_live_board_pushes_snapshots_on_change() {
    let app = spawn_app(TestOptions::default());
    let addr = app.serve().await;
    let id = card_order(&app, "ana@example.com").await;
    let admin = app.sign_up(ADMIN_EMAIL).await;

    let mut socket = connect(addr, &admin).await.unwrap();
    let initial = next_push(&mut socket).await.unwrap();
    assert!(initial.get("change").is_none());
    assert_eq!(initial["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(initial["transactions"][0]["status"], "InProgress");

    let (_, body) = app
        .post(
            &format!("/admin/transactions/{}/status", id),
            Some(&admin),
            json!({ "newStatus": "Delivered" }),
        )
        .await;
    assert_eq!(body["changed"], true);

    let pushed = next_push(&mut socket).await.unwrap();
    assert_eq!(pushed["change"]["kind"], "updated");
    assert_eq!(pushed["change"]["status"], "Delivered");
    assert_eq!(pushed["transactions"][0]["status"], "Delivered");

    card_order(&app, "luis@example.com").await;
    let pushed = next_push(&mut socket).await.unwrap();
    assert_eq!(pushed["change"]["kind"], "created");
    assert_eq!(pushed["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(pushed["transactions"][0]["userEmail"], "luis@example.com");
}

#[tokio::test]
async fn test_live_board_closes_when_admin_signs_out() {
    let app = spawn_app(TestOptions::default());
    let addr = app.serve().await;
    let admin = app.sign_up(ADMIN_EMAIL).await;

    let mut socket = connect(addr, &admin).await.unwrap();
    let initial = next_push(&mut socket).await.unwrap();
    assert!(initial["transactions"].as_array().unwrap().is_empty());

    app.post("/auth/signout", Some(&admin), json!({})).await;
    assert!(next_push(&mut socket).await.is_none());

    assert_eq!(refused(addr, &admin).await, 401);
}
