use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, FromRequestParts, Query, State};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::bearer_token;
use crate::middleware::cancel::RequestCancel;
use crate::middleware::origin::RequestOrigin;
use crate::state::AppState;
use crate::ws::hub::ConnectionContext;

/// Query parameters accepted on the upgrade request. Browsers cannot set
/// headers on a WebSocket handshake, so both values may arrive here.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    pub access_token: Option<String>,
    pub device_id: Option<String>,
}

/// Transport metadata read from the upgrade request.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub bearer: Option<String>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    fn from_parts(parts: &Parts) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        // First hop of x-forwarded-for, then the socket peer.
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty())
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        Self {
            bearer: bearer_token(parts).map(str::to_string),
            ip_address,
            device_id: header("x-device-id"),
            user_agent: header(USER_AGENT.as_str()),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// A token, from the `Authorization` header or the `access_token` query
/// parameter, is put through the full validation before the upgrade; a bad
/// one is refused with 401. No token at all yields an anonymous connection.
pub async fn ws_handler(
    State(state): State<AppState>,
    origin: RequestOrigin,
    cancel: RequestCancel,
    client: ClientMeta,
    Query(query): Query<WsQuery>,
    ws: Result<WebSocketUpgrade, axum::extract::ws::rejection::WebSocketUpgradeRejection>,
) -> Response {
    let token = client.bearer.or(query.access_token.filter(|t| !t.is_empty()));

    let user_id = match token {
        Some(token) => {
            let token_origin = origin.token_origin(&state.config.jwt);
            match state
                .tokens
                .validate(&token, &token_origin, cancel.token())
                .await
            {
                Ok(session) => Some(session.user.id),
                Err(e) => return AppError::from(e).into_response(),
            }
        }
        None => None,
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let context = ConnectionContext {
        user_id,
        ip_address: client.ip_address,
        device_id: client.device_id.or(query.device_id),
        user_agent: client.user_agent,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, context))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Registers with the hub and the outbound manager, forwards queued frames
/// on a spawned sender task, and reads inbound frames until the peer goes
/// away. Deregistration always runs, whatever ended the loop.
async fn handle_socket(socket: WebSocket, state: AppState, context: ConnectionContext) {
    let user_id = context.user_id;
    let conn_id = state.hub.on_connect(context).await;

    let mut rx = state.ws_manager.add(conn_id.clone(), user_id).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {
                // Inbound application frames are not part of the protocol.
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    state.hub.on_disconnect(&conn_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn client_meta_reads_proxy_and_device_headers() {
        let (parts, _) = Request::builder()
            .uri("/api/v1/ws")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-device-id", "phone-1")
            .header("user-agent", "test-agent")
            .header("authorization", "Bearer abc")
            .body(())
            .unwrap()
            .into_parts();

        let meta = ClientMeta::from_parts(&parts);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.device_id.as_deref(), Some("phone-1"));
        assert_eq!(meta.user_agent.as_deref(), Some("test-agent"));
        assert_eq!(meta.bearer.as_deref(), Some("abc"));
    }

    #[test]
    fn client_meta_uses_peer_address_without_proxy() {
        let (mut parts, _) = Request::builder()
            .uri("/api/v1/ws")
            .body(())
            .unwrap()
            .into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        let meta = ClientMeta::from_parts(&parts);
        assert_eq!(meta.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(meta.bearer.is_none());
    }
}
