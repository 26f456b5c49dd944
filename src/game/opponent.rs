//! Stand-in opponent for local play: it only ever turns to face the player

use super::entity::{Entity, Facing};
use super::Intent;

pub struct OpponentController;

impl OpponentController {
    /// Turn the opponent towards the player. Runs every tick, locked or not.
    pub fn face(opponent: &mut Entity, player: &Entity) {
        opponent.facing = Facing::towards(opponent.x, player.x);
    }

    /// The opponent never presses anything
    pub fn intent() -> Intent {
        Intent::default()
    }
}
