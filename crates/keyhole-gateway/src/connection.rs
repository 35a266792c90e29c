use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use keyhole_types::api::Claims;
use keyhole_types::events::{GatewayCommand, GatewayEvent};

use crate::registry::Registry;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket gets to complete the identify handshake.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: identify handshake, presence
/// registration, then the event loop until either side hangs up.
pub async fn handle_connection(socket: WebSocket, registry: Registry, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let (user_id, email) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(identity) => identity,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", email, user_id);

    let ready = GatewayEvent::Ready { user_id };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // Subscribe before registering so this client also receives the
    // online-list broadcast announcing its own arrival.
    let mut broadcast_rx = registry.subscribe();
    let (conn_id, mut user_rx) = registry.register(user_id).await;

    let registry_recv = registry.clone();
    let email_recv = email.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&registry_recv, user_id, &email_recv, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            email_recv,
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(user_id, conn_id).await;
    info!("{} ({}) disconnected from gateway", email, user_id);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some((token_data.claims.sub, token_data.claims.email));
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(registry: &Registry, user_id: Uuid, email: &str, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::DownloadImage(data) => {
            // Relay verbatim to the connection named in the payload.
            let target = data
                .get("recipientId")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Uuid>().ok());

            match target {
                Some(recipient_id) => {
                    registry
                        .send_to_user(recipient_id, GatewayEvent::ImageDownload(data))
                        .await;
                }
                None => {
                    warn!("{} ({}) downloadImage without a recipientId", email, user_id);
                }
            }
        }
    }
}
