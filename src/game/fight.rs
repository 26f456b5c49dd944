//! One two-fighter simulation, shared by the local session and room server

use tracing::debug;

use super::action::ActionStateMachine;
use super::combat::{CombatSystem, HitResult};
use super::entity::{Entity, Side};
use super::opponent::OpponentController;
use super::physics::{Arena, PhysicsSystem};
use super::round::{KoReason, Round, RoundConfig, RoundEvent};
use super::snapshot::{GameSnapshot, PlayerView};
use super::Intent;

/// Something observable that happened during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FightEvent {
    Hit { attacker: usize, result: HitResult },
    KnockedOut(KoReason),
    RoundReset,
}

impl From<RoundEvent> for FightEvent {
    fn from(event: RoundEvent) -> Self {
        match event {
            RoundEvent::KnockedOut(reason) => FightEvent::KnockedOut(reason),
            RoundEvent::Reset => FightEvent::RoundReset,
        }
    }
}

pub struct Fight {
    fighters: [Entity; 2],
    arena: Arena,
    round: Round,
    /// Slot steered by the simple opponent, if any
    ai_slot: Option<usize>,
}

impl Fight {
    pub fn new(names: [String; 2], arena: Arena, round: RoundConfig) -> Self {
        let [left, right] = names;
        Self {
            fighters: [Entity::new(left, Side::Left), Entity::new(right, Side::Right)],
            arena,
            round: Round::new(round),
            ai_slot: None,
        }
    }

    /// Player on the left, simple opponent on the right, manual restarts
    pub fn local(player_name: impl Into<String>, arena: Arena) -> Self {
        let mut fight = Self::new(
            [player_name.into(), "CPU".to_string()],
            arena,
            RoundConfig::manual(),
        );
        fight.ai_slot = Some(1);
        fight
    }

    pub fn fighters(&self) -> &[Entity; 2] {
        &self.fighters
    }

    pub fn fighter_mut(&mut self, slot: usize) -> Option<&mut Entity> {
        self.fighters.get_mut(slot)
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Advance one tick. `None` marks a vacant slot: that fighter neither
    /// moves nor takes part in combat.
    pub fn step(&mut self, intents: [Option<Intent>; 2]) -> Vec<FightEvent> {
        let mut events = Vec::new();

        if let Some(event) = self.round.tick_clock(&mut self.fighters) {
            events.push(event.into());
        }
        if self.round.is_over() {
            return events;
        }

        // Intent -> movement and action starts
        for (fighter, intent) in self.fighters.iter_mut().zip(&intents) {
            if let Some(intent) = intent {
                ActionStateMachine::apply_intent(fighter, intent);
            }
        }

        if let Some(ai) = self.ai_slot {
            let [a, b] = &mut self.fighters;
            let (opponent, player) = if ai == 0 { (a, &*b) } else { (b, &*a) };
            OpponentController::face(opponent, player);
        }

        // Physics
        for (fighter, intent) in self.fighters.iter_mut().zip(&intents) {
            let Some(intent) = intent else { continue };
            let was_on_ground = fighter.on_ground;
            PhysicsSystem::integrate(fighter, &self.arena, intent.is_moving());
            if PhysicsSystem::landed(was_on_ground, fighter) {
                ActionStateMachine::on_landing(fighter, intent);
            }
        }

        // Combat, both directions; skipped while anyone is missing
        if intents.iter().all(Option::is_some) {
            let [a, b] = &mut self.fighters;
            let first = CombatSystem::resolve(a, b).map(|result| (0, result));
            let second = CombatSystem::resolve(b, a).map(|result| (1, result));
            for (attacker, result) in first.into_iter().chain(second) {
                debug!(
                    attacker,
                    damage = result.damage,
                    blocked = result.blocked,
                    knocked_out = result.defender_knocked_out,
                    "Hit landed"
                );
                events.push(FightEvent::Hit { attacker, result });
            }
        }

        for (fighter, intent) in self.fighters.iter_mut().zip(&intents) {
            if let Some(intent) = intent {
                ActionStateMachine::tick_timer(fighter, intent);
            }
        }

        if let Some(event) = self.round.check_knockout(&self.fighters) {
            events.push(event.into());
        }

        events
    }

    /// Start a new round if the current one is over. Returns whether it did.
    pub fn restart(&mut self) -> bool {
        if !self.round.is_over() {
            return false;
        }
        self.round.reset(&mut self.fighters);
        true
    }

    /// Reset one fighter to spawn, e.g. when its player leaves
    pub fn reset_fighter(&mut self, slot: usize) {
        if let Some(fighter) = self.fighters.get_mut(slot) {
            fighter.reset_for_round();
        }
    }

    pub fn snapshot(&self, tps: u32) -> GameSnapshot {
        GameSnapshot {
            players: self.fighters.iter().map(PlayerView::from).collect(),
            ko: self.round.is_over(),
            ko_reason: self.round.ko_reason(),
            timer: self.round.seconds_remaining(tps).unwrap_or(0),
        }
    }
}
