//! # WebSocket Endpoint
//!
//! GET /v1/ws?token=<bearer>
//!
//! The bearer credential is verified synchronously during the handshake;
//! absent or invalid tokens close the connection immediately with code 1008
//! — no anonymous connection is ever retained in the registry. Browsers
//! cannot set headers on upgrade requests, so the token travels as a query
//! parameter or in the `Sec-WebSocket-Protocol` header (`bearer, <token>`).

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcaster::protocol::{ClientMessage, ServerMessage};
use crate::broadcaster::registry::ClientRegistry;
use crate::constants::Role;
use crate::web::auth::Claims;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// GET /v1/ws — upgrade to WebSocket
pub async fn handle_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = query
        .token
        .clone()
        .or_else(|| token_from_subprotocol(&headers));

    if !state.authenticator.enabled() {
        let claims = Claims::local_admin();
        return ws.on_upgrade(move |socket| client_session(socket, state, claims));
    }

    let claims = token.and_then(|t| match state.authenticator.validate_token(&t) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!(error = %e, "WebSocket handshake token rejected");
            None
        }
    });

    match claims {
        Some(claims) => ws.on_upgrade(move |socket| client_session(socket, state, claims)),
        None => ws.on_upgrade(close_unauthorized),
    }
}

/// `Sec-WebSocket-Protocol: bearer, <token>`
fn token_from_subprotocol(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("sec-websocket-protocol")?.to_str().ok()?;
    let mut parts = value.split(',').map(str::trim);
    match (parts.next(), parts.next()) {
        (Some("bearer"), Some(token)) if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}

async fn close_unauthorized(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: "unauthorized".into(),
        })))
        .await;
}

async fn client_session(socket: WebSocket, state: AppState, claims: Claims) {
    // Role validity was established at the handshake
    let Ok(role) = claims.role() else {
        close_unauthorized(socket).await;
        return;
    };

    let client_id = Uuid::new_v4();
    let registry = state.hub.registry().clone();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.hub.config().client_buffer);
    registry.connect(client_id, claims.sub.clone(), role, tx);

    info!(client_id = %client_id, user = %claims.sub, role = %role, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let welcome = ServerMessage::welcome(
        &client_id.to_string(),
        &claims.sub,
        role.as_str(),
        state.hub.acl().allowed_for(role),
    );
    if send_frame(&mut sink, &welcome).await.is_err() {
        registry.disconnect(&client_id);
        return;
    }

    loop {
        tokio::select! {
            // Outbound frames: protocol replies and broadcast fan-out
            frame = rx.recv() => {
                match frame {
                    Some(frame) => {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    // Registry entry dropped (idle eviction); end the session
                    None => break,
                }
            }

            // Inbound client messages
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        registry.touch(&client_id);
                        handle_client_message(&text, &registry, &state, client_id, role);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        registry.touch(&client_id);
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        registry.touch(&client_id);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(client_id = %client_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let _ = sink.close().await;
    registry.disconnect(&client_id);
    info!(client_id = %client_id, "WebSocket session cleaned up");
}

/// Dispatch one inbound frame. Malformed or unauthorized requests get an
/// explicit `error` reply, never a silent drop.
fn handle_client_message(
    text: &str,
    registry: &ClientRegistry,
    state: &AppState,
    client_id: Uuid,
    role: Role,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            registry.send_to(
                &client_id,
                ServerMessage::error("invalid_message", &format!("Unparseable request: {e}")),
            );
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { channels } => {
            let (accepted, rejected) = state.hub.acl().partition(role, &channels);
            let subscribed = registry.subscribe(&client_id, &accepted);
            registry.send_to(
                &client_id,
                ServerMessage::subscription_confirmed(&accepted, &rejected, &subscribed),
            );
        }
        ClientMessage::Unsubscribe { channels } => {
            let subscribed = registry.unsubscribe(&client_id, &channels);
            registry.send_to(
                &client_id,
                ServerMessage::subscription_confirmed(&channels, &[], &subscribed),
            );
        }
        ClientMessage::JoinRoom { room } => {
            registry.join_room(&client_id, room.clone());
            registry.send_to(&client_id, ServerMessage::room_joined(&room));
        }
        ClientMessage::LeaveRoom { .. } => {
            registry.leave_room(&client_id);
            registry.send_to(&client_id, ServerMessage::room_left());
        }
        ClientMessage::Ping => {
            registry.send_to(&client_id, ServerMessage::pong());
        }
        ClientMessage::Heartbeat => {
            registry.send_to(&client_id, ServerMessage::heartbeat_ack());
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ServerMessage) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(frame).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
