//! Offline session: the player against the simple opponent

use std::future::Future;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::game::opponent::OpponentController;
use crate::game::physics::Arena;
use crate::game::{Fight, FightEvent, Intent, Outcome, PlayerView};
use crate::input::InputChannels;
use crate::render::{Frame, Hud, Renderer};
use crate::util::time::{tick_interval, INPUT_TPS, RENDER_TPS};

/// Owns everything a local fight needs. Created once, torn down by `run`
/// returning.
pub struct LocalSession<R> {
    fight: Fight,
    renderer: R,
    /// Last sampled intent; applied on every simulation tick
    held: Intent,
}

impl<R: Renderer> LocalSession<R> {
    pub fn new(player_name: &str, arena: Arena, renderer: R) -> Self {
        Self {
            fight: Fight::local(player_name, arena),
            renderer,
            held: Intent::default(),
        }
    }

    pub fn fight(&self) -> &Fight {
        &self.fight
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Input sampling tick
    pub fn sample_input(&mut self, intent: Intent) {
        self.held = intent;
    }

    /// Restart request; ignored while a round is still running
    pub fn restart(&mut self) -> bool {
        let restarted = self.fight.restart();
        if restarted {
            info!("Round restarted");
        }
        restarted
    }

    /// Render tick: advance the simulation once and draw the result
    pub fn tick(&mut self) -> Vec<FightEvent> {
        let events = self
            .fight
            .step([Some(self.held), Some(OpponentController::intent())]);
        for event in &events {
            if let FightEvent::KnockedOut(reason) = event {
                info!(?reason, "Knockout");
            }
        }
        let frame = self.frame();
        self.renderer.draw(&frame);
        events
    }

    /// The player is always fighter 0 locally
    pub fn frame(&self) -> Frame {
        let [me, opponent] = self.fight.fighters();
        let round = self.fight.round();
        let my_hp = Some(me.hp());
        let opponent_hp = Some(opponent.hp());
        Frame {
            fighters: vec![PlayerView::from(me), PlayerView::from(opponent)],
            hud: Hud {
                my_hp,
                opponent_hp,
                timer_secs: None,
                ping_ms: None,
            },
            outcome: Outcome::derive(round.is_over(), round.ko_reason(), my_hp, opponent_hp),
        }
    }

    /// Drive the session until `shutdown` resolves. Both periodic activities
    /// live in this one loop and stop together.
    pub async fn run(mut self, mut input: InputChannels, shutdown: impl Future<Output = ()>) {
        let mut render = interval(tick_interval(RENDER_TPS));
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sample = interval(tick_interval(INPUT_TPS));
        sample.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("Local session started");
        loop {
            tokio::select! {
                _ = render.tick() => {
                    self.tick();
                }
                _ = sample.tick() => {
                    let intent = *input.intents.borrow();
                    self.sample_input(intent);
                }
                Some(()) = input.restarts.recv() => {
                    self.restart();
                }
                _ = &mut shutdown => break,
            }
        }
        info!("Local session ended");
    }
}
