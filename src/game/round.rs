//! Round lifecycle: knockout detection, optional time limit, reset

use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::ActionStateMachine;
use super::entity::Entity;

/// Ticks the server waits after a KO before starting the next round
pub const AUTO_RESET_TICKS: u32 = 60;
/// Round length on the server
pub const ROUND_SECONDS: u32 = 90;

/// Why a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KoReason {
    /// A fighter ran out of health
    Hp,
    /// The round clock hit zero
    Timeout,
    /// Anything this build does not know about
    #[serde(other)]
    Unknown,
}

/// Round clock and knockout behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    /// Round length in ticks, `None` for an untimed round
    pub time_limit_ticks: Option<u32>,
    /// Ticks after a KO until an automatic reset, `None` to wait for a restart
    pub auto_reset_ticks: Option<u32>,
}

impl RoundConfig {
    /// Untimed round, restarted on request
    pub fn manual() -> Self {
        Self {
            time_limit_ticks: None,
            auto_reset_ticks: None,
        }
    }

    /// Timed round that restarts itself, for a loop running at `tps`
    pub fn timed(tps: u32) -> Self {
        Self {
            time_limit_ticks: Some(ROUND_SECONDS * tps),
            auto_reset_ticks: Some(AUTO_RESET_TICKS),
        }
    }
}

/// Emitted by the round when it changes state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    KnockedOut(KoReason),
    Reset,
}

#[derive(Debug, Clone)]
pub struct Round {
    config: RoundConfig,
    ko: Option<KoReason>,
    remaining_ticks: u32,
    ko_ticks: u32,
}

impl Round {
    pub fn new(config: RoundConfig) -> Self {
        Self {
            config,
            ko: None,
            remaining_ticks: config.time_limit_ticks.unwrap_or(0),
            ko_ticks: 0,
        }
    }

    pub fn is_over(&self) -> bool {
        self.ko.is_some()
    }

    pub fn ko_reason(&self) -> Option<KoReason> {
        self.ko
    }

    /// Whole seconds left on the clock, `None` for untimed rounds
    pub fn seconds_remaining(&self, tps: u32) -> Option<u32> {
        self.config
            .time_limit_ticks
            .map(|_| self.remaining_ticks / tps.max(1))
    }

    /// Advance the round clock by one tick. The clock keeps running during
    /// a KO; a KO counts towards the automatic reset.
    pub fn tick_clock(&mut self, fighters: &mut [Entity]) -> Option<RoundEvent> {
        let mut event = None;

        if self.config.time_limit_ticks.is_some() {
            if self.remaining_ticks > 0 {
                self.remaining_ticks -= 1;
            } else if self.ko.is_none() {
                event = self.knock_out(KoReason::Timeout);
            }
        }

        if self.ko.is_some() {
            if let Some(delay) = self.config.auto_reset_ticks {
                self.ko_ticks += 1;
                if self.ko_ticks >= delay {
                    self.reset(fighters);
                    return Some(RoundEvent::Reset);
                }
            }
        }

        event
    }

    /// End the round if either fighter is down. Fires once per round.
    pub fn check_knockout(&mut self, fighters: &[Entity]) -> Option<RoundEvent> {
        if fighters.iter().any(Entity::is_knocked_out) {
            self.knock_out(KoReason::Hp)
        } else {
            None
        }
    }

    /// Restore every fighter to its spawn pose and restart the clock
    pub fn reset(&mut self, fighters: &mut [Entity]) {
        for fighter in fighters.iter_mut() {
            fighter.reset_for_round();
            ActionStateMachine::interrupt(fighter);
        }
        self.ko = None;
        self.ko_ticks = 0;
        self.remaining_ticks = self.config.time_limit_ticks.unwrap_or(0);
    }

    fn knock_out(&mut self, reason: KoReason) -> Option<RoundEvent> {
        if self.ko.is_some() {
            return None;
        }
        self.ko = Some(reason);
        self.ko_ticks = 0;
        Some(RoundEvent::KnockedOut(reason))
    }
}

/// Result banner shown to one viewer. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    TimeUp,
    YouLose,
    YouWin,
    Knockout,
}

impl Outcome {
    /// Pick the banner for a viewer. A timeout wins over health, the
    /// viewer's own health is checked before the opponent's, and a bare KO
    /// flag falls back to a neutral banner.
    pub fn derive(
        ko: bool,
        reason: Option<KoReason>,
        my_hp: Option<i32>,
        opponent_hp: Option<i32>,
    ) -> Option<Self> {
        let me_down = my_hp.is_some_and(|hp| hp <= 0);
        let opponent_down = opponent_hp.is_some_and(|hp| hp <= 0);
        if !(ko || me_down || opponent_down) {
            return None;
        }

        Some(if reason == Some(KoReason::Timeout) {
            Outcome::TimeUp
        } else if me_down {
            Outcome::YouLose
        } else if opponent_down {
            Outcome::YouWin
        } else {
            Outcome::Knockout
        })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::TimeUp => "Time Up!",
            Outcome::YouLose => "You Lose",
            Outcome::YouWin => "You Win!",
            Outcome::Knockout => "KO!",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::{Action, Side, MAX_HP};

    fn fighters() -> [Entity; 2] {
        [Entity::new("a", Side::Left), Entity::new("b", Side::Right)]
    }

    #[test]
    fn double_knockout_signals_once() {
        let mut round = Round::new(RoundConfig::manual());
        let mut f = fighters();
        f[0].set_hp(0);
        f[1].set_hp(0);

        assert_eq!(
            round.check_knockout(&f),
            Some(RoundEvent::KnockedOut(KoReason::Hp))
        );
        assert_eq!(round.check_knockout(&f), None);
        assert!(round.is_over());

        round.reset(&mut f);
        assert!(!round.is_over());
        assert_eq!(f[0].hp(), MAX_HP);
        assert_eq!(f[1].hp(), MAX_HP);
        assert_eq!(f[0].x, -f[1].x);
    }

    #[test]
    fn manual_round_never_resets_itself() {
        let mut round = Round::new(RoundConfig::manual());
        let mut f = fighters();
        f[1].set_hp(0);
        round.check_knockout(&f);
        for _ in 0..1000 {
            assert_eq!(round.tick_clock(&mut f), None);
        }
        assert!(round.is_over());
        assert_eq!(round.seconds_remaining(60), None);
    }

    #[test]
    fn timeout_then_auto_reset() {
        let config = RoundConfig {
            time_limit_ticks: Some(3),
            auto_reset_ticks: Some(2),
        };
        let mut round = Round::new(config);
        let mut f = fighters();
        f[0].action = Action::Heavy;
        f[0].action_timer = 9;
        f[1].set_hp(40);

        for _ in 0..3 {
            assert_eq!(round.tick_clock(&mut f), None);
        }
        assert_eq!(
            round.tick_clock(&mut f),
            Some(RoundEvent::KnockedOut(KoReason::Timeout))
        );
        assert_eq!(round.ko_reason(), Some(KoReason::Timeout));
        assert_eq!(round.tick_clock(&mut f), Some(RoundEvent::Reset));

        assert!(!round.is_over());
        assert_eq!(f[0].action, Action::Idle);
        assert_eq!(f[0].action_timer, 0);
        assert_eq!(f[1].hp(), MAX_HP);
        assert_eq!(round.seconds_remaining(1), Some(3));
    }

    #[test]
    fn clock_in_whole_seconds() {
        let round = Round::new(RoundConfig::timed(20));
        assert_eq!(round.seconds_remaining(20), Some(ROUND_SECONDS));
    }

    #[test]
    fn outcome_priorities() {
        use Outcome::*;
        assert_eq!(Outcome::derive(false, None, Some(50), Some(60)), None);
        assert_eq!(
            Outcome::derive(true, Some(KoReason::Timeout), Some(0), Some(60)),
            Some(TimeUp)
        );
        assert_eq!(Outcome::derive(false, None, Some(0), Some(0)), Some(YouLose));
        assert_eq!(
            Outcome::derive(true, Some(KoReason::Hp), Some(10), Some(0)),
            Some(YouWin)
        );
        assert_eq!(Outcome::derive(true, None, None, None), Some(Knockout));
        assert_eq!(YouWin.to_string(), "You Win!");
    }
}
