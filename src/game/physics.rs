//! Fighter physics: gravity, friction, integration, ground and wall clamps

use super::entity::Entity;

/// Downward acceleration per tick
pub const GRAVITY: f32 = 0.8;
/// Horizontal decay when no direction is held
pub const FRICTION: f32 = 0.8;
/// Horizontal decay while an attack or block is locked in
pub const LOCKED_DAMPING: f32 = 0.9;
/// Distance kept between a fighter and the arena edge
pub const WALL_INSET: f32 = 50.0;
/// Default arena half width (server coordinates)
pub const DEFAULT_HALF_WIDTH: f32 = 600.0;

/// Stage geometry. x is measured from the centre, y from the ground line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub ground_y: f32,
    pub left_bound: f32,
    pub right_bound: f32,
}

impl Arena {
    pub fn new(half_width: f32) -> Self {
        // Arenas narrower than the wall inset collapse onto the centre
        let bound = (half_width - WALL_INSET).max(0.0);
        Self {
            ground_y: 0.0,
            left_bound: -bound,
            right_bound: bound,
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_WIDTH)
    }
}

/// Physics system for advancing fighters one tick
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one fighter by a single tick.
    ///
    /// `moving` is whether a direction is held this tick; it only affects
    /// friction; velocity from input is set by the action state machine.
    pub fn integrate(entity: &mut Entity, arena: &Arena, moving: bool) {
        if entity.action.is_locked() {
            entity.vel_x *= LOCKED_DAMPING;
        } else if !moving {
            entity.vel_x *= FRICTION;
        }

        entity.vel_y += GRAVITY;

        entity.x += entity.vel_x;
        entity.y += entity.vel_y;

        if entity.y > arena.ground_y {
            entity.y = arena.ground_y;
            entity.vel_y = 0.0;
            entity.on_ground = true;
        } else if entity.y < arena.ground_y {
            entity.on_ground = false;
        }

        // Walls clamp position only; velocity keeps pushing
        entity.x = entity.x.clamp(arena.left_bound, arena.right_bound);
    }

    /// Whether the fighter touched down during the last integration
    pub fn landed(was_on_ground: bool, entity: &Entity) -> bool {
        !was_on_ground && entity.on_ground
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::{Action, Side};

    fn fighter() -> Entity {
        Entity::new("p", Side::Left)
    }

    #[test]
    fn grounded_fighter_stays_grounded() {
        let arena = Arena::default();
        let mut e = fighter();
        PhysicsSystem::integrate(&mut e, &arena, false);
        assert_eq!(e.y, 0.0);
        assert_eq!(e.vel_y, 0.0);
        assert!(e.on_ground);
    }

    #[test]
    fn jump_arc_lands() {
        let arena = Arena::default();
        let mut e = fighter();
        e.vel_y = -17.0;
        e.on_ground = false;

        PhysicsSystem::integrate(&mut e, &arena, false);
        assert!((e.vel_y - (-16.2)).abs() < 1e-4);
        assert!((e.y - (-16.2)).abs() < 1e-4);
        assert!(!e.on_ground);

        let mut ticks = 1;
        while !e.on_ground {
            PhysicsSystem::integrate(&mut e, &arena, false);
            ticks += 1;
            assert!(ticks < 100, "never landed");
        }
        assert_eq!(e.y, 0.0);
        assert_eq!(e.vel_y, 0.0);
    }

    #[test]
    fn friction_depends_on_input_and_lock() {
        let arena = Arena::default();

        let mut idle = fighter();
        idle.vel_x = 5.0;
        PhysicsSystem::integrate(&mut idle, &arena, false);
        assert!((idle.vel_x - 4.0).abs() < 1e-5);

        let mut walking = fighter();
        walking.vel_x = 5.0;
        PhysicsSystem::integrate(&mut walking, &arena, true);
        assert_eq!(walking.vel_x, 5.0);

        // Locked actions keep more inertia, even with a direction held
        let mut punching = fighter();
        punching.action = Action::Light;
        punching.vel_x = 5.0;
        PhysicsSystem::integrate(&mut punching, &arena, true);
        assert!((punching.vel_x - 4.5).abs() < 1e-5);
    }

    #[test]
    fn walls_clamp_position_not_velocity() {
        let arena = Arena::new(100.0);
        let mut e = fighter();
        e.x = -49.0;
        e.vel_x = -5.0;
        PhysicsSystem::integrate(&mut e, &arena, true);
        assert_eq!(e.x, -50.0);
        assert_eq!(e.vel_x, -5.0);

        e.x = 49.0;
        e.vel_x = 5.0;
        PhysicsSystem::integrate(&mut e, &arena, true);
        assert_eq!(e.x, 50.0);
    }

    #[test]
    fn tiny_arena_does_not_panic() {
        let arena = Arena::new(10.0);
        assert_eq!(arena.left_bound, 0.0);
        let mut e = fighter();
        PhysicsSystem::integrate(&mut e, &arena, false);
        assert_eq!(e.x, 0.0);
    }
}
