//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::room::{Membership, RoomBroadcast, RoomHandle, RoomRegistry};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ProtocolError, ServerMsg};

/// What the reader side asks the writer task to do
enum Outbound {
    /// Send one message to this client only
    Send(ServerMsg),
    /// Start forwarding a room's broadcast
    Follow(broadcast::Receiver<RoomBroadcast>),
    /// Stop forwarding room traffic
    Unfollow,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let hello = ServerMsg::Hello {
        ts: Utc::now().to_rfc3339(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &hello).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send hello");
        return;
    }

    let (out_tx, out_rx) = mpsc::channel(64);
    let writer_handle = tokio::spawn(run_writer(conn_id, ws_sink, out_rx));

    let mut session = Session {
        conn_id,
        rooms: state.rooms.clone(),
        room: None,
        out: out_tx,
    };
    run_reader(&mut session, ws_stream).await;

    // Cleanup on disconnect
    session.leave().await;
    drop(session);
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Per-connection state owned by the reader loop
struct Session {
    conn_id: Uuid,
    rooms: Arc<RoomRegistry>,
    room: Option<RoomHandle>,
    out: mpsc::Sender<Outbound>,
}

impl Session {
    async fn handle(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::Join { room, name } => self.join(room, name).await,
            ClientMsg::Input { pressed } => {
                let Some(room) = self.room.clone() else {
                    return;
                };
                if room.input(self.conn_id, pressed).await.is_err() {
                    debug!(conn_id = %self.conn_id, room = %room.id, "Room gone");
                    self.room = None;
                    self.push(Outbound::Unfollow).await;
                }
            }
            ClientMsg::Ping { ts } => {
                self.reply(ServerMsg::Pong {
                    ts,
                    server_ts: unix_millis(),
                })
                .await;
            }
            ClientMsg::Leave => self.leave().await,
        }
    }

    async fn join(&mut self, room: String, name: String) {
        if self.room.as_ref().is_some_and(|r| r.id != room.trim()) {
            self.leave().await;
        }

        match self.rooms.join(&room, self.conn_id, &name).await {
            Ok(Membership {
                handle,
                slot,
                updates,
            }) => {
                info!(conn_id = %self.conn_id, room = %handle.id, slot, "Joined room");
                self.push(Outbound::Follow(updates)).await;
                self.reply(ServerMsg::Joined {
                    room: handle.id.clone(),
                    slot,
                })
                .await;
                self.room = Some(handle);
            }
            Err(e) => {
                warn!(conn_id = %self.conn_id, room = %room, error = %e, "Join rejected");
                self.reply(ServerMsg::Error {
                    reason: e.reason().to_string(),
                })
                .await;
            }
        }
    }

    async fn leave(&mut self) {
        if let Some(room) = self.room.take() {
            let _ = room.leave(self.conn_id).await;
            self.push(Outbound::Unfollow).await;
        }
    }

    async fn reply(&self, msg: ServerMsg) {
        self.push(Outbound::Send(msg)).await;
    }

    async fn push(&self, outbound: Outbound) {
        if self.out.send(outbound).await.is_err() {
            debug!(conn_id = %self.conn_id, "Writer gone");
        }
    }
}

/// Reader loop: WebSocket -> session
async fn run_reader(session: &mut Session, mut ws_stream: SplitStream<WebSocket>) {
    let conn_id = session.conn_id;
    let rate_limiter = ConnectionRateLimiter::new();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(conn_id = %conn_id, "Rate limited message");
                    continue;
                }

                match ClientMsg::parse(&text) {
                    Ok(ClientMsg::Join { .. }) if !rate_limiter.check_join() => {
                        warn!(conn_id = %conn_id, "Rate limited join");
                    }
                    Ok(msg) => session.handle(msg).await,
                    Err(ProtocolError::UnknownType(kind)) => {
                        warn!(conn_id = %conn_id, kind = %kind, "Unknown message type");
                        session
                            .reply(ServerMsg::Error {
                                reason: "unknown_type".to_string(),
                            })
                            .await;
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Writer task: direct replies and room broadcasts -> WebSocket
async fn run_writer(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<Outbound>,
) {
    let mut room_rx: Option<broadcast::Receiver<RoomBroadcast>> = None;

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Send(msg)) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Some(Outbound::Follow(rx)) => room_rx = Some(rx),
                Some(Outbound::Unfollow) => room_rx = None,
                None => break,
            },
            update = recv_room(&mut room_rx) => match update {
                Ok(update) => {
                    if !update.is_for(conn_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &update.msg).await {
                        debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        conn_id = %conn_id,
                        lagged_count = n,
                        "Client lagged, skipping {} room updates", n
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Room channel closed");
                    room_rx = None;
                }
            },
        }
    }
}

/// Next room update, or never when not in a room
async fn recv_room(
    rx: &mut Option<broadcast::Receiver<RoomBroadcast>>,
) -> Result<RoomBroadcast, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
