//! Game simulation modules

pub mod action;
pub mod combat;
pub mod entity;
pub mod fight;
pub mod opponent;
pub mod physics;
pub mod round;
pub mod snapshot;

pub use entity::{Action, Entity, Facing, Side};
pub use fight::{Fight, FightEvent};
pub use round::{KoReason, Outcome, Round, RoundConfig};
pub use snapshot::{GameSnapshot, PlayerView};

use serde::{Deserialize, Serialize};

/// Pressed-key set for one fighter, sampled every tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intent {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub light: bool,
    pub heavy: bool,
    pub block: bool,
}

impl Intent {
    /// Held direction; left wins when both are held
    pub fn direction(&self) -> Option<Facing> {
        if self.left {
            Some(Facing::Left)
        } else if self.right {
            Some(Facing::Right)
        } else {
            None
        }
    }

    pub fn is_moving(&self) -> bool {
        self.left || self.right
    }

    /// Merge a partial update; absent keys keep their previous state
    pub fn apply(&mut self, update: &IntentUpdate) {
        let fields = [
            (&mut self.left, update.left),
            (&mut self.right, update.right),
            (&mut self.up, update.up),
            (&mut self.light, update.light),
            (&mut self.heavy, update.heavy),
            (&mut self.block, update.block),
        ];
        for (slot, value) in fields {
            if let Some(pressed) = value {
                *slot = pressed;
            }
        }
    }
}

/// Partial intent as received from a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heavy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<bool>,
}

impl From<Intent> for IntentUpdate {
    fn from(intent: Intent) -> Self {
        Self {
            left: Some(intent.left),
            right: Some(intent.right),
            up: Some(intent.up),
            light: Some(intent.light),
            heavy: Some(intent.heavy),
            block: Some(intent.block),
        }
    }
}
