//! Networked client session
//!
//! One socket reader and one socket writer run as tasks; the session loop
//! owns the reconciliation state and drives rendering, input and pings.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::reconciler::ReconciliationState;
use crate::config::Config;
use crate::game::GameSnapshot;
use crate::input::InputChannels;
use crate::render::Renderer;
use crate::util::time::{
    tick_interval, unix_millis, INPUT_TPS, PING_INTERVAL, RENDER_TPS, SNAPSHOT_INTERVAL,
};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// How long teardown waits for the leave message to flush
const FLUSH_TIMEOUT: Duration = Duration::from_millis(200);

/// Server message as seen by the session loop
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Joined { room: String, slot: u8 },
    PeerJoined { name: String, slot: u8 },
    PeerLeft { slot: u8 },
    State(GameSnapshot),
    Pong { ts: Option<u64> },
    Error(String),
}

impl NetEvent {
    /// `None` for messages the session has no use for
    pub fn from_server(msg: ServerMsg) -> Option<Self> {
        match msg {
            ServerMsg::Hello { ts } => {
                debug!(server_time = %ts, "Server hello");
                None
            }
            ServerMsg::Joined { room, slot } => Some(NetEvent::Joined { room, slot }),
            ServerMsg::PeerJoined { name, slot } => Some(NetEvent::PeerJoined { name, slot }),
            ServerMsg::PeerLeft { slot } => Some(NetEvent::PeerLeft { slot }),
            ServerMsg::State { snapshot, .. } => Some(NetEvent::State(snapshot)),
            ServerMsg::Pong { ts, .. } => Some(NetEvent::Pong { ts }),
            ServerMsg::Error { reason } => Some(NetEvent::Error(reason)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Server ended the session: {0}")]
    Rejected(String),

    #[error("Connection closed")]
    Closed,

    #[error("No room configured")]
    NoRoom,
}

/// Fold one server event into the reconciliation state
pub fn apply(
    state: &mut ReconciliationState,
    event: NetEvent,
    now: Instant,
    now_ms: u64,
) -> Result<(), ClientError> {
    match event {
        NetEvent::Joined { room, slot } => {
            info!(%room, slot, "Joined room");
            state.set_slot(slot);
        }
        NetEvent::PeerJoined { name, slot } => info!(%name, slot, "Opponent joined"),
        NetEvent::PeerLeft { slot } => info!(slot, "Opponent left"),
        NetEvent::State(snapshot) => state.on_snapshot(snapshot, now),
        NetEvent::Pong { ts: Some(ts) } => {
            let rtt = state.on_pong(ts, now_ms);
            debug!(rtt_ms = rtt, "Pong");
        }
        NetEvent::Pong { ts: None } => {}
        NetEvent::Error(reason) => return Err(ClientError::Rejected(reason)),
    }
    Ok(())
}

/// Queue an outbound message without stalling the session loop
fn queue(out: &mpsc::Sender<ClientMsg>, msg: ClientMsg) -> Result<(), ClientError> {
    match out.try_send(msg) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(msg)) => {
            warn!(?msg, "Outbound queue full, dropping message");
            Ok(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(ClientError::Closed),
    }
}

/// Connect, join the configured room and run until shutdown or a
/// session-ending server message
pub async fn run<R: Renderer>(
    config: &Config,
    input: InputChannels,
    mut renderer: R,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ClientError> {
    let room = config.room.clone().ok_or(ClientError::NoRoom)?;
    let (socket, _) = connect_async(config.server_url.as_str()).await?;
    info!(url = %config.server_url, %room, "Connected");

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ClientMsg>(32);
    let (event_tx, mut event_rx) = mpsc::channel::<NetEvent>(64);

    let mut writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMsg>(&text) {
                    Ok(msg) => {
                        if let Some(event) = NetEvent::from_server(msg) {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping malformed server message"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Socket error");
                    break;
                }
            }
        }
    });

    let result = session_loop(
        config,
        room,
        input,
        &mut renderer,
        &out_tx,
        &mut event_rx,
        shutdown,
    )
    .await;

    // Teardown: say goodbye, let the writer flush, then stop both tasks
    let _ = out_tx.try_send(ClientMsg::Leave);
    drop(out_tx);
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    reader.abort();
    info!("Client session ended");

    result
}

async fn session_loop<R: Renderer>(
    config: &Config,
    room: String,
    input: InputChannels,
    renderer: &mut R,
    out: &mpsc::Sender<ClientMsg>,
    events: &mut mpsc::Receiver<NetEvent>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ClientError> {
    let mut state = ReconciliationState::new(SNAPSHOT_INTERVAL);

    queue(
        out,
        ClientMsg::Join {
            room,
            name: config.player_name.clone(),
        },
    )?;

    let mut render = interval(tick_interval(RENDER_TPS));
    render.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut send_input = interval(tick_interval(INPUT_TPS));
    send_input.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ping = interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = render.tick() => {
                renderer.draw(&state.frame(Instant::now()));
            }
            _ = send_input.tick() => {
                // Nothing to steer until a slot is assigned
                if state.slot().is_some() {
                    let intent = *input.intents.borrow();
                    queue(out, ClientMsg::Input { pressed: intent.into() })?;
                }
            }
            _ = ping.tick() => {
                queue(out, ClientMsg::Ping { ts: Some(unix_millis()) })?;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return Err(ClientError::Closed);
                };
                apply(&mut state, event, Instant::now(), unix_millis())?;
            }
            _ = &mut shutdown => return Ok(()),
        }
    }
}
