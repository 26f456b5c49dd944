//! Snapshot types shared by the room server and the networked client

use serde::{Deserialize, Serialize};

use super::entity::{Action, Entity, Facing};
use super::round::KoReason;

/// Public state of one fighter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub action: Action,
    pub hp: i32,
    #[serde(default)]
    pub name: String,
}

impl From<&Entity> for PlayerView {
    fn from(entity: &Entity) -> Self {
        Self {
            x: entity.x,
            y: entity.y,
            facing: entity.facing,
            action: entity.action,
            hp: entity.hp(),
            name: entity.name.clone(),
        }
    }
}

/// Authoritative state of a room at one point in time. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    #[serde(default)]
    pub players: Vec<PlayerView>,
    #[serde(default)]
    pub ko: bool,
    #[serde(rename = "koReason", default, skip_serializing_if = "Option::is_none")]
    pub ko_reason: Option<KoReason>,
    /// Whole seconds left in the round
    #[serde(default)]
    pub timer: u32,
}
