use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::chat::CoreRequest;
use crate::error::StoreError;
use crate::model::Message;
use crate::view::{render_chat_page, CLIENT_PAGE};

/// Handlers hold no chat state of their own; everything goes through the
/// event loop that owns the core.
#[derive(Clone)]
pub struct ServerState {
    pub core: flume::Sender<CoreRequest>,
}

#[derive(Debug, Deserialize)]
struct PostMessageRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct PostMessageResponse {
    success: bool,
    message: Message,
}

pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind chat server to {}", addr))?;
    Ok(listener)
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/client", get(client_page))
        .route("/chat/:username", get(get_chat).post(post_chat))
        .route("/chat/:username/", get(get_chat).post(post_chat))
        .route("/connect-websocket", get(connect_websocket))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, core: flume::Sender<CoreRequest>) -> Result<()> {
    let state = Arc::new(ServerState { core });
    let app = router(state);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Courier listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .await
        .context("Chat server failed")?;
    Ok(())
}

pub fn spawn_server(listener: TcpListener, core: flume::Sender<CoreRequest>) -> JoinHandle<Result<()>> {
    tokio::spawn(serve(listener, core))
}

async fn client_page() -> Html<&'static str> {
    Html(CLIENT_PAGE)
}

async fn get_chat(
    State(state): State<Arc<ServerState>>,
    Path(username): Path<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    let view = ask_core(&state, |reply| CoreRequest::ViewChat { username, reply })
        .await?
        .map_err(store_error)?;
    Ok(Html(render_chat_page(&view)))
}

async fn post_chat(
    State(state): State<Arc<ServerState>>,
    Path(username): Path<String>,
    body: Bytes,
) -> Result<Response, (StatusCode, String)> {
    // Remote clients do not reliably set a JSON content type.
    let request: PostMessageRequest = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid message body: {}", e)))?;

    let message = ask_core(&state, |reply| CoreRequest::ReceiveMessage {
        username,
        body: request.message,
        reply,
    })
    .await?
    .map_err(store_error)?;

    let payload = serde_json::to_string(&PostMessageResponse {
        success: true,
        message,
    })
    .map_err(|e| internal_error(e.into()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], payload).into_response())
}

async fn connect_websocket(
    State(state): State<Arc<ServerState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_push_socket(state, socket))
}

async fn handle_push_socket(state: Arc<ServerState>, mut socket: WebSocket) {
    let (outbound_tx, outbound_rx) = flume::unbounded::<String>();
    let id = match ask_core(&state, |reply| CoreRequest::AttachChannel {
        outbound: outbound_tx,
        reply,
    })
    .await
    {
        Ok(id) => id,
        Err(_) => {
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv_async() => {
                match outgoing {
                    Ok(payload) => {
                        if socket.send(WsMessage::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        tracing::debug!("Push channel {} superseded; closing socket", id);
                        let _ = socket.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // No inbound data is expected on the push channel.
                    _ => {}
                }
            }
        }
    }

    let _ = state.core.send_async(CoreRequest::DetachChannel { id }).await;
}

async fn ask_core<T>(
    state: &ServerState,
    build: impl FnOnce(oneshot::Sender<T>) -> CoreRequest,
) -> Result<T, (StatusCode, String)> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .core
        .send_async(build(reply_tx))
        .await
        .map_err(|_| core_unavailable())?;
    reply_rx.await.map_err(|_| core_unavailable())
}

fn store_error(error: StoreError) -> (StatusCode, String) {
    let status = match &error {
        StoreError::InvalidUsername(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound { .. } | StoreError::OutOfRange { .. } => StatusCode::NOT_FOUND,
        StoreError::MalformedRecord { .. } | StoreError::IoFailure { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, error.to_string())
}

fn core_unavailable() -> (StatusCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "chat core is not running".to_string(),
    )
}

fn internal_error(error: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
}
