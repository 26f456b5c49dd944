//! Combat system - fist reach, damage, block mitigation, knockback

use super::entity::{Action, Entity, Facing};

/// Stick figure proportions, measured from the hip
pub const BODY_LEN: f32 = 40.0;
pub const ARM_LEN: f32 = 30.0;
/// Shoulder sits this far below the top of the body
pub const SHOULDER_DROP: f32 = 10.0;

/// Arm angles in radians (screen space, y grows downward)
pub const REST_ARM_ANGLE: f32 = -1.2;
pub const PUNCH_ANGLE_RIGHT: f32 = -0.2;
pub const PUNCH_ANGLE_LEFT: f32 = -2.94;

/// Maximum fist-to-torso distance that still connects
pub const REACH: f32 = 20.0;

pub const LIGHT_DAMAGE: i32 = 8;
pub const HEAVY_DAMAGE: i32 = 18;
/// Fraction of damage that gets through a correctly facing block
pub const BLOCK_FACTOR: f32 = 0.4;

pub const KNOCKBACK_X: f32 = 2.0;
pub const KNOCKBACK_Y: f32 = 3.0;

/// A point in arena coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Outcome of a landed hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitResult {
    pub damage: i32,
    pub blocked: bool,
    pub defender_knocked_out: bool,
}

/// Combat system for resolving melee hits
pub struct CombatSystem;

impl CombatSystem {
    /// Arm angle for a pose; attacks extend the arm forward
    pub fn arm_angle(action: Action, facing: Facing) -> f32 {
        if action.is_attack() {
            match facing {
                Facing::Right => PUNCH_ANGLE_RIGHT,
                Facing::Left => PUNCH_ANGLE_LEFT,
            }
        } else {
            REST_ARM_ANGLE
        }
    }

    /// Tip of the leading arm
    pub fn fist_position(x: f32, y: f32, action: Action, facing: Facing) -> Point {
        let angle = Self::arm_angle(action, facing);
        let shoulder_y = y - BODY_LEN + SHOULDER_DROP;
        Point {
            x: x + angle.cos() * ARM_LEN,
            y: shoulder_y + angle.sin() * ARM_LEN,
        }
    }

    /// Middle of the torso
    pub fn torso_target(x: f32, y: f32) -> Point {
        Point {
            x,
            y: y - BODY_LEN / 2.0,
        }
    }

    pub fn base_damage(action: Action) -> Option<i32> {
        match action {
            Action::Light => Some(LIGHT_DAMAGE),
            Action::Heavy => Some(HEAVY_DAMAGE),
            _ => None,
        }
    }

    /// A block only counts when the defender looks at the attacker's side
    pub fn is_facing_attacker(defender: &Entity, attacker_x: f32) -> bool {
        let attacker_on_right = attacker_x > defender.x;
        match defender.facing {
            Facing::Right => attacker_on_right,
            Facing::Left => !attacker_on_right,
        }
    }

    pub fn mitigate(damage: i32, blocked: bool) -> i32 {
        if blocked {
            (damage as f32 * BLOCK_FACTOR).round() as i32
        } else {
            damage
        }
    }

    /// Resolve the attacker's current activation against the defender.
    ///
    /// Returns `None` when nothing connects: the attacker is not attacking,
    /// has already hit during this activation, or is out of reach.
    pub fn resolve(attacker: &mut Entity, defender: &mut Entity) -> Option<HitResult> {
        let base = Self::base_damage(attacker.action)?;
        if attacker.has_hit_this_action {
            return None;
        }

        let fist = Self::fist_position(attacker.x, attacker.y, attacker.action, attacker.facing);
        let target = Self::torso_target(defender.x, defender.y);
        if fist.distance(target) > REACH {
            return None;
        }

        let blocked =
            defender.action == Action::Block && Self::is_facing_attacker(defender, attacker.x);
        let damage = defender.take_damage(Self::mitigate(base, blocked));

        // Pushed away from the attacker, popped up if standing
        let away = if attacker.x > defender.x { -1.0 } else { 1.0 };
        defender.vel_x += KNOCKBACK_X * away;
        if defender.on_ground {
            defender.vel_y = -KNOCKBACK_Y;
        }

        attacker.has_hit_this_action = true;

        Some(HitResult {
            damage,
            blocked,
            defender_knocked_out: defender.is_knocked_out(),
        })
    }
}
