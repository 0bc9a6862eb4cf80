//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::MAX_MESSAGE_BYTES;
use crate::game::{ArenaCommand, ArenaHandle, ConnId};
use crate::identity::TwitchIdentity;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn = Uuid::new_v4();
    info!(conn_id = %conn, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (direct_tx, direct_rx) = mpsc::unbounded_channel();

    // Subscribe before registering so nothing broadcast after the join is missed
    let events = state.arena.subscribe();
    if !state
        .arena
        .send(ArenaCommand::Connect {
            conn,
            tx: direct_tx.clone(),
        })
        .await
    {
        error!(conn_id = %conn, "Arena is not running");
        return;
    }

    let writer = tokio::spawn(write_loop(conn, ws_sink, events, direct_rx));

    read_loop(conn, ws_stream, &state.arena, &state.identity, &direct_tx).await;

    // Signal disconnect to the arena
    state.arena.send(ArenaCommand::Disconnect { conn }).await;
    writer.abort();

    info!(conn_id = %conn, "WebSocket connection closed");
}

/// Forward arena broadcasts and direct replies to the socket
async fn write_loop(
    conn: ConnId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut events: broadcast::Receiver<ServerMsg>,
    mut direct_rx: mpsc::UnboundedReceiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            msg = direct_rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            msg = events.recv() => match msg {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Continue - don't disconnect for lag
                    warn!(conn_id = %conn, lagged_count = n, "Client lagged, skipping messages");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn, "Broadcast channel closed");
                    break;
                }
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(conn_id = %conn, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Reader loop: WebSocket -> arena
async fn read_loop(
    conn: ConnId,
    mut ws_stream: SplitStream<WebSocket>,
    arena: &ArenaHandle,
    identity: &TwitchIdentity,
    direct_tx: &mpsc::UnboundedSender<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn, "Received binary message, ignoring");
                continue;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn, error = %e, "WebSocket error");
                break;
            }
        };

        match screen_frame(&text, &rate_limiter) {
            Ok(()) => {}
            Err(Dropped::Oversized) => {
                warn!(conn_id = %conn, size = text.len(), "Oversized message dropped");
                continue;
            }
            Err(Dropped::RateLimited) => {
                warn!(conn_id = %conn, "Rate limited message");
                continue;
            }
        }

        let msg = match serde_json::from_str::<ClientMsg>(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(conn_id = %conn, error = %e, "Failed to parse client message");
                continue;
            }
        };

        let Some(cmd) = command_for(conn, msg, identity, direct_tx).await else {
            continue;
        };
        if !arena.send(cmd).await {
            debug!(conn_id = %conn, "Arena channel closed");
            break;
        }
    }
}

/// Why an inbound frame was discarded before parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dropped {
    Oversized,
    RateLimited,
}

/// Size is checked first so oversized frames never spend rate quota
fn screen_frame(text: &str, limiter: &ConnectionRateLimiter) -> Result<(), Dropped> {
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(Dropped::Oversized);
    }
    if !limiter.check_frame() {
        return Err(Dropped::RateLimited);
    }
    Ok(())
}

/// Translate a client message into an arena command
async fn command_for(
    conn: ConnId,
    msg: ClientMsg,
    identity: &TwitchIdentity,
    direct_tx: &mpsc::UnboundedSender<ServerMsg>,
) -> Option<ArenaCommand> {
    match msg {
        ClientMsg::Join {
            username,
            twitch_token: Some(token),
            spectator,
        } => match identity.resolve(&token).await {
            Ok(username) => {
                info!(conn_id = %conn, username = %username, "Twitch identity resolved");
                Some(ArenaCommand::Join {
                    conn,
                    username,
                    spectator,
                })
            }
            Err(e) => {
                warn!(conn_id = %conn, error = %e, fallback = ?username, "Twitch identity failed");
                let _ = direct_tx.send(ServerMsg::AuthError {
                    message: e.to_string(),
                });
                None
            }
        },
        ClientMsg::Join {
            username,
            twitch_token: None,
            spectator,
        } => Some(ArenaCommand::Join {
            conn,
            username: username.unwrap_or_default(),
            spectator,
        }),
        ClientMsg::Input(controls) => Some(ArenaCommand::Input { conn, controls }),
        ClientMsg::StartGame => Some(ArenaCommand::StartGame { conn }),
        ClientMsg::SpawnNuts => {
            debug!(conn_id = %conn, "spawn_nuts ignored");
            None
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
