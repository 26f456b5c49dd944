//! Fighter state shared by every simulation driver

use serde::{Deserialize, Serialize};

/// Maximum (and starting) health
pub const MAX_HP: i32 = 100;

/// Horizontal distance of each spawn point from the arena centre
pub const SPAWN_OFFSET: f32 = 120.0;

/// Which way a fighter looks. Serialized as `1` / `-1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Facing {
    Right,
    Left,
}

impl Facing {
    /// Unit sign along the x axis
    pub fn sign(self) -> f32 {
        match self {
            Facing::Right => 1.0,
            Facing::Left => -1.0,
        }
    }

    /// Facing that looks from `from_x` towards `to_x`
    pub fn towards(from_x: f32, to_x: f32) -> Self {
        if to_x > from_x {
            Facing::Right
        } else {
            Facing::Left
        }
    }
}

impl From<Facing> for i8 {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::Right => 1,
            Facing::Left => -1,
        }
    }
}

impl TryFrom<i8> for Facing {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Facing::Right),
            -1 => Ok(Facing::Left),
            other => Err(format!("invalid facing {other}")),
        }
    }
}

/// Current pose/action of a fighter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Idle,
    Run,
    Jump,
    Light,
    Heavy,
    Block,
}

impl Action {
    /// Attacks and block lock out facing changes, jumps and new actions
    pub fn is_locked(self) -> bool {
        matches!(self, Action::Light | Action::Heavy | Action::Block)
    }

    pub fn is_attack(self) -> bool {
        matches!(self, Action::Light | Action::Heavy)
    }
}

/// Which side of the arena a fighter spawns on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn spawn_x(self) -> f32 {
        match self {
            Side::Left => -SPAWN_OFFSET,
            Side::Right => SPAWN_OFFSET,
        }
    }

    /// Spawned fighters face the arena centre
    pub fn spawn_facing(self) -> Facing {
        match self {
            Side::Left => Facing::Right,
            Side::Right => Facing::Left,
        }
    }
}

/// One fighter (authoritative, mutated only by the simulation that owns it)
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub side: Side,

    // Position relative to arena centre / ground line (negative y = airborne)
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub on_ground: bool,
    pub facing: Facing,

    pub action: Action,
    /// Ticks left before a locked action may end
    pub action_timer: u32,
    hp: i32,
    /// One hit per attack activation
    pub has_hit_this_action: bool,
}

impl Entity {
    pub fn new(name: impl Into<String>, side: Side) -> Self {
        Self {
            name: name.into(),
            side,
            x: side.spawn_x(),
            y: 0.0,
            vel_x: 0.0,
            vel_y: 0.0,
            on_ground: true,
            facing: side.spawn_facing(),
            action: Action::Idle,
            action_timer: 0,
            hp: MAX_HP,
            has_hit_this_action: false,
        }
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    /// Set health, clamped to `[0, MAX_HP]`
    pub fn set_hp(&mut self, hp: i32) {
        self.hp = hp.clamp(0, MAX_HP);
    }

    /// Apply damage, returns the health actually removed
    pub fn take_damage(&mut self, damage: i32) -> i32 {
        let before = self.hp;
        self.set_hp(before - damage.max(0));
        before - self.hp
    }

    pub fn is_knocked_out(&self) -> bool {
        self.hp <= 0
    }

    /// Back to the spawn pose for a fresh round
    pub fn reset_for_round(&mut self) {
        let name = std::mem::take(&mut self.name);
        *self = Self::new(name, self.side);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_faces_centre() {
        let left = Entity::new("a", Side::Left);
        let right = Entity::new("b", Side::Right);
        assert_eq!(left.x, -SPAWN_OFFSET);
        assert_eq!(left.facing, Facing::Right);
        assert_eq!(right.x, SPAWN_OFFSET);
        assert_eq!(right.facing, Facing::Left);
        assert_eq!(left.hp(), MAX_HP);
    }

    #[test]
    fn hp_is_clamped() {
        let mut e = Entity::new("a", Side::Left);
        assert_eq!(e.take_damage(30), 30);
        assert_eq!(e.take_damage(500), 70);
        assert_eq!(e.hp(), 0);
        assert!(e.is_knocked_out());

        e.set_hp(250);
        assert_eq!(e.hp(), MAX_HP);

        // Negative damage never heals
        assert_eq!(e.take_damage(-10), 0);
        assert_eq!(e.hp(), MAX_HP);
    }

    #[test]
    fn reset_keeps_name_and_side() {
        let mut e = Entity::new("Ann", Side::Right);
        e.x = 3.0;
        e.vel_y = -4.0;
        e.action = Action::Heavy;
        e.action_timer = 7;
        e.has_hit_this_action = true;
        e.take_damage(99);

        e.reset_for_round();
        assert_eq!(e, Entity::new("Ann", Side::Right));
    }

    #[test]
    fn facing_wire_format() {
        assert_eq!(serde_json::to_string(&Facing::Left).unwrap(), "-1");
        let f: Facing = serde_json::from_str("1").unwrap();
        assert_eq!(f, Facing::Right);
        assert!(serde_json::from_str::<Facing>("0").is_err());
        assert_eq!(serde_json::to_string(&Action::Heavy).unwrap(), "\"heavy\"");
    }
}
