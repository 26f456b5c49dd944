//! Per-fighter action state machine
//!
//! `idle`/`run` are re-derived from input every tick. `light`, `heavy` and
//! `block` are timed and lock the fighter: direction input can no longer turn
//! it or start anything new, and physics damps its inertia instead of
//! applying walk friction. `jump` ends only on landing.

use super::entity::{Action, Entity};
use super::Intent;

/// Horizontal walk velocity
pub const WALK_SPEED: f32 = 5.0;
/// Upward impulse applied on jump
pub const JUMP_POWER: f32 = 17.0;

/// Ticks each timed action lasts
pub const LIGHT_TICKS: u32 = 10;
pub const HEAVY_TICKS: u32 = 18;
pub const BLOCK_TICKS: u32 = 14;

pub struct ActionStateMachine;

impl ActionStateMachine {
    /// Apply this tick's intent: walking, facing, jumps and action starts.
    /// Runs before physics.
    pub fn apply_intent(entity: &mut Entity, intent: &Intent) {
        let locked = entity.action.is_locked();

        if !locked {
            match intent.direction() {
                Some(facing) => {
                    entity.vel_x = facing.sign() * WALK_SPEED;
                    entity.facing = facing;
                    if entity.on_ground && entity.action != Action::Jump {
                        entity.action = Action::Run;
                    }
                }
                None => {
                    if entity.on_ground && entity.action == Action::Run {
                        entity.action = Action::Idle;
                    }
                }
            }

            if intent.up && entity.on_ground {
                entity.vel_y = -JUMP_POWER;
                entity.on_ground = false;
                entity.action = Action::Jump;
            }
        }

        if entity.on_ground && entity.action_timer == 0 {
            if intent.light {
                Self::start(entity, Action::Light, LIGHT_TICKS);
            } else if intent.heavy {
                Self::start(entity, Action::Heavy, HEAVY_TICKS);
            }
        }

        if intent.block && entity.on_ground && !entity.action.is_locked() {
            Self::start(entity, Action::Block, BLOCK_TICKS);
        }

        // Releasing block ends it early, whatever the timer says
        if !intent.block && entity.action == Action::Block {
            entity.action_timer = 0;
            entity.action = Self::free_action(entity, intent);
        }
    }

    /// Touching down ends a jump. Locked actions keep running.
    pub fn on_landing(entity: &mut Entity, intent: &Intent) {
        if !entity.action.is_locked() {
            entity.action = Self::free_action(entity, intent);
        }
    }

    /// Count down the action timer; an expiring timed action falls back to
    /// `run` or `idle`. Runs after combat.
    pub fn tick_timer(entity: &mut Entity, intent: &Intent) {
        if entity.action_timer == 0 {
            return;
        }
        entity.action_timer -= 1;
        if entity.action_timer == 0 && entity.action != Action::Jump {
            entity.action = Self::free_action(entity, intent);
        }
    }

    /// Forced back to idle (round reset)
    pub fn interrupt(entity: &mut Entity) {
        entity.action = Action::Idle;
        entity.action_timer = 0;
    }

    fn start(entity: &mut Entity, action: Action, ticks: u32) {
        entity.action = action;
        entity.action_timer = ticks;
        if action.is_attack() {
            entity.has_hit_this_action = false;
        }
    }

    fn free_action(entity: &Entity, intent: &Intent) -> Action {
        if entity.on_ground && intent.is_moving() {
            Action::Run
        } else {
            Action::Idle
        }
    }
}
