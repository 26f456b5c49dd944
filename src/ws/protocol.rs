//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::{GameSnapshot, IntentUpdate};

/// Message types a client may send
const CLIENT_MSG_TYPES: [&str; 4] = ["join", "input", "leave", "ping"];

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join (or create) a room
    Join {
        #[serde(default)]
        room: String,
        #[serde(default = "default_name")]
        name: String,
    },

    /// Currently pressed keys; absent keys keep their last value
    Input {
        #[serde(default)]
        pressed: IntentUpdate,
    },

    /// Leave the current room
    Leave,

    /// Latency probe
    Ping {
        /// Client timestamp, echoed back untouched
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<u64>,
    },
}

fn default_name() -> String {
    "Player".to_string()
}

impl ClientMsg {
    /// Parse an inbound text frame, telling unknown message types apart from
    /// garbage
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => Ok(msg),
            Err(err) => {
                let kind = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string));
                match kind {
                    Some(kind) if !CLIENT_MSG_TYPES.contains(&kind.as_str()) => {
                        Err(ProtocolError::UnknownType(kind))
                    }
                    _ => Err(ProtocolError::Malformed(err)),
                }
            }
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Greeting right after the socket opens
    Hello {
        /// Server time, RFC 3339
        ts: String,
    },

    /// Confirmation of room join
    Joined {
        room: String,
        /// 1 or 2
        slot: u8,
    },

    /// The other player joined
    PeerJoined { name: String, slot: u8 },

    /// The other player left
    PeerLeft { slot: u8 },

    /// Authoritative room state, sent every server tick
    State {
        #[serde(default)]
        room: String,
        #[serde(flatten)]
        snapshot: GameSnapshot,
    },

    /// Reply to a ping
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ts: Option<u64>,
        #[serde(rename = "serverTs", default)]
        server_ts: u64,
    },

    /// Session-level error, not recoverable by the client
    Error { reason: String },
}

/// Inbound frame that could not be turned into a `ClientMsg`
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Action, Facing, KoReason, PlayerView};

    #[test]
    fn parses_client_messages() {
        let msg = ClientMsg::parse(r#"{"type":"join","room":"r1"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Join {
                room: "r1".into(),
                name: "Player".into()
            }
        );

        let msg = ClientMsg::parse(r#"{"type":"input","pressed":{"left":true}}"#).unwrap();
        match msg {
            ClientMsg::Input { pressed } => {
                assert_eq!(pressed.left, Some(true));
                assert_eq!(pressed.block, None);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            ClientMsg::parse(r#"{"type":"ping","ts":17}"#).unwrap(),
            ClientMsg::Ping { ts: Some(17) }
        );
    }

    #[test]
    fn unknown_type_vs_garbage() {
        assert!(matches!(
            ClientMsg::parse(r#"{"type":"dance"}"#),
            Err(ProtocolError::UnknownType(t)) if t == "dance"
        ));
        assert!(matches!(
            ClientMsg::parse("{not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMsg::parse(r#"{"type":"ping","ts":"soon"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn state_message_is_flat() {
        let msg = ServerMsg::State {
            room: "r1".into(),
            snapshot: GameSnapshot {
                players: vec![PlayerView {
                    x: -120.0,
                    y: 0.0,
                    facing: Facing::Right,
                    action: Action::Idle,
                    hp: 100,
                    name: "Ann".into(),
                }],
                ko: true,
                ko_reason: Some(KoReason::Timeout),
                timer: 0,
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["koReason"], "timeout");
        assert_eq!(value["players"][0]["facing"], 1);
        assert_eq!(value["players"][0]["action"], "idle");

        let back: ServerMsg = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn pong_field_names() {
        let json = serde_json::to_value(ServerMsg::Pong {
            ts: Some(5),
            server_ts: 9,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong", "ts": 5, "serverTs": 9}));
    }
}
