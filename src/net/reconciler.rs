//! Snapshot reconciliation for the networked client
//!
//! Keeps the two most recent authoritative snapshots and turns them into one
//! interpolated, perspective-mapped frame per render tick. The pair is only
//! replaced as a whole when a snapshot arrives, so a frame never sees a half
//! shifted state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::game::{GameSnapshot, Outcome, PlayerView};
use crate::render::{Frame, Hud};

/// Which snapshot index is "me" and which is the opponent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perspective {
    pub me: usize,
    pub opponent: usize,
}

impl Perspective {
    /// Slot 2 plays the second fighter; any other slot (or none yet) the first
    pub fn for_slot(slot: Option<u8>) -> Self {
        if slot == Some(2) {
            Self { me: 1, opponent: 0 }
        } else {
            Self { me: 0, opponent: 1 }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SnapshotPair {
    previous: Option<Arc<GameSnapshot>>,
    current: Option<Arc<GameSnapshot>>,
}

#[derive(Debug, Clone)]
pub struct ReconciliationState {
    pair: SnapshotPair,
    last_arrival: Option<Instant>,
    slot: Option<u8>,
    ping_ms: Option<u64>,
    /// Expected snapshot cadence
    window: Duration,
}

impl ReconciliationState {
    pub fn new(window: Duration) -> Self {
        Self {
            pair: SnapshotPair::default(),
            last_arrival: None,
            slot: None,
            ping_ms: None,
            window,
        }
    }

    pub fn set_slot(&mut self, slot: u8) {
        self.slot = Some(slot);
    }

    pub fn slot(&self) -> Option<u8> {
        self.slot
    }

    pub fn ping_ms(&self) -> Option<u64> {
        self.ping_ms
    }

    pub fn current(&self) -> Option<&GameSnapshot> {
        self.pair.current.as_deref()
    }

    /// Store a freshly arrived snapshot; the old current becomes previous
    pub fn on_snapshot(&mut self, snapshot: GameSnapshot, now: Instant) {
        let pair = SnapshotPair {
            previous: self.pair.current.take(),
            current: Some(Arc::new(snapshot)),
        };
        self.pair = pair;
        self.last_arrival = Some(now);
    }

    /// Record the round trip of an echoed probe, returns it in milliseconds
    pub fn on_pong(&mut self, echoed_ms: u64, now_ms: u64) -> u64 {
        let rtt = now_ms.saturating_sub(echoed_ms);
        self.ping_ms = Some(rtt);
        rtt
    }

    /// Progress between previous and current snapshot, always in `[0, 1]`
    pub fn interpolation_factor(&self, now: Instant) -> f32 {
        let Some(arrived) = self.last_arrival else {
            return 1.0;
        };
        if self.window.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(arrived);
        (elapsed.as_secs_f32() / self.window.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// Build the frame to draw at `now`
    pub fn frame(&self, now: Instant) -> Frame {
        let hud = Hud {
            ping_ms: self.ping_ms,
            ..Hud::default()
        };
        let Some(current) = self.pair.current.as_deref() else {
            return Frame {
                hud,
                ..Frame::default()
            };
        };

        let fighters = match self.pair.previous.as_deref() {
            Some(previous) if previous.players.len() == current.players.len() => {
                let dt = self.interpolation_factor(now);
                previous
                    .players
                    .iter()
                    .zip(&current.players)
                    .map(|(old, new)| interpolate(old, new, dt))
                    .collect()
            }
            // First snapshot or player count changed: draw raw positions
            _ => current.players.clone(),
        };

        let perspective = Perspective::for_slot(self.slot);
        let my_hp = current.players.get(perspective.me).map(|p| p.hp);
        let opponent_hp = current.players.get(perspective.opponent).map(|p| p.hp);

        Frame {
            fighters,
            hud: Hud {
                my_hp,
                opponent_hp,
                timer_secs: Some(current.timer),
                ..hud
            },
            outcome: Outcome::derive(current.ko, current.ko_reason, my_hp, opponent_hp),
        }
    }
}

/// Position blends between snapshots; everything else snaps to `new`
fn interpolate(old: &PlayerView, new: &PlayerView, dt: f32) -> PlayerView {
    PlayerView {
        x: old.x + (new.x - old.x) * dt,
        y: old.y + (new.y - old.y) * dt,
        ..new.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Action, Facing, KoReason};

    const WINDOW: Duration = Duration::from_millis(50);

    fn player(x: f32, y: f32, hp: i32, action: Action) -> PlayerView {
        PlayerView {
            x,
            y,
            facing: Facing::Right,
            action,
            hp,
            name: format!("p{x}"),
        }
    }

    fn snapshot(players: Vec<PlayerView>) -> GameSnapshot {
        GameSnapshot {
            players,
            timer: 60,
            ..GameSnapshot::default()
        }
    }

    #[test]
    fn empty_state_draws_only_ping() {
        let mut state = ReconciliationState::new(WINDOW);
        state.on_pong(1_000, 1_042);
        let frame = state.frame(Instant::now());
        assert!(frame.fighters.is_empty());
        assert_eq!(frame.hud.ping_ms, Some(42));
        assert_eq!(frame.outcome, None);
    }

    #[test]
    fn interpolates_between_two_snapshots() {
        let t0 = Instant::now();
        let mut state = ReconciliationState::new(WINDOW);
        state.on_snapshot(
            snapshot(vec![player(0.0, 0.0, 100, Action::Idle), player(100.0, 0.0, 100, Action::Idle)]),
            t0,
        );
        let t1 = t0 + Duration::from_millis(50);
        state.on_snapshot(
            snapshot(vec![player(10.0, -20.0, 90, Action::Light), player(100.0, 0.0, 80, Action::Block)]),
            t1,
        );

        let at_start = state.frame(t1);
        assert_eq!(at_start.fighters[0].x, 0.0);
        assert_eq!(at_start.fighters[0].y, 0.0);
        // Discrete state snaps to the newest snapshot
        assert_eq!(at_start.fighters[0].action, Action::Light);
        assert_eq!(at_start.fighters[0].hp, 90);

        let halfway = state.frame(t1 + Duration::from_millis(25));
        assert!((halfway.fighters[0].x - 5.0).abs() < 1e-3);
        assert!((halfway.fighters[0].y + 10.0).abs() < 1e-3);

        let at_end = state.frame(t1 + Duration::from_millis(50));
        assert_eq!(at_end.fighters[0].x, 10.0);

        // Factor saturates instead of extrapolating
        let late = state.frame(t1 + Duration::from_secs(3));
        assert_eq!(late.fighters[0].x, 10.0);
        assert_eq!(state.interpolation_factor(t1 + Duration::from_secs(3)), 1.0);
    }

    #[test]
    fn factor_is_clamped_for_clock_skew() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let mut state = ReconciliationState::new(WINDOW);
        state.on_snapshot(snapshot(vec![]), t0);
        // Asked for a frame "before" the arrival
        assert_eq!(state.interpolation_factor(t0 - Duration::from_millis(10)), 0.0);

        let zero = ReconciliationState::new(Duration::ZERO);
        assert_eq!(zero.interpolation_factor(Instant::now()), 1.0);
    }

    #[test]
    fn player_count_change_falls_back_to_raw() {
        let t0 = Instant::now();
        let mut state = ReconciliationState::new(WINDOW);

        // First snapshot has nothing to blend with
        state.on_snapshot(snapshot(vec![player(30.0, 0.0, 100, Action::Idle)]), t0);
        assert_eq!(state.frame(t0).fighters[0].x, 30.0);

        state.on_snapshot(
            snapshot(vec![player(0.0, 0.0, 100, Action::Idle), player(50.0, 0.0, 100, Action::Idle)]),
            t0,
        );
        let frame = state.frame(t0);
        assert_eq!(frame.fighters.len(), 2);
        assert_eq!(frame.fighters[0].x, 0.0);

        state.on_snapshot(
            snapshot(vec![player(8.0, 0.0, 100, Action::Idle), player(40.0, 0.0, 100, Action::Idle)]),
            t0,
        );
        // 2 -> 2 interpolates again (dt = 0 shows the previous position)
        assert_eq!(state.frame(t0).fighters[0].x, 0.0);

        state.on_snapshot(snapshot(vec![player(9.0, 0.0, 100, Action::Idle)]), t0);
        // 2 -> 1 draws the raw current snapshot
        let frame = state.frame(t0);
        assert_eq!(frame.fighters.len(), 1);
        assert_eq!(frame.fighters[0].x, 9.0);
    }

    #[test]
    fn perspective_follows_slot() {
        assert_eq!(Perspective::for_slot(Some(1)), Perspective { me: 0, opponent: 1 });
        assert_eq!(Perspective::for_slot(Some(2)), Perspective { me: 1, opponent: 0 });
        assert_eq!(Perspective::for_slot(None), Perspective { me: 0, opponent: 1 });

        let t0 = Instant::now();
        let mut state = ReconciliationState::new(WINDOW);
        state.set_slot(2);
        let mut snap = snapshot(vec![player(0.0, 0.0, 0, Action::Idle), player(50.0, 0.0, 35, Action::Idle)]);
        snap.ko = true;
        snap.ko_reason = Some(KoReason::Hp);
        state.on_snapshot(snap, t0);

        let frame = state.frame(t0);
        assert_eq!(frame.hud.my_hp, Some(35));
        assert_eq!(frame.hud.opponent_hp, Some(0));
        assert_eq!(frame.outcome, Some(Outcome::YouWin));
        assert_eq!(frame.hud.timer_secs, Some(60));

        state.set_slot(1);
        let frame = state.frame(t0);
        assert_eq!(frame.hud.my_hp, Some(0));
        assert_eq!(frame.outcome, Some(Outcome::YouLose));
    }

    #[test]
    fn timeout_beats_health() {
        let t0 = Instant::now();
        let mut state = ReconciliationState::new(WINDOW);
        let mut snap = snapshot(vec![player(0.0, 0.0, 0, Action::Idle), player(50.0, 0.0, 35, Action::Idle)]);
        snap.ko = true;
        snap.ko_reason = Some(KoReason::Timeout);
        state.on_snapshot(snap, t0);
        assert_eq!(state.frame(t0).outcome, Some(Outcome::TimeUp));

        let mut snap = snapshot(vec![]);
        snap.ko = true;
        state.on_snapshot(snap, t0);
        assert_eq!(state.frame(t0).outcome, Some(Outcome::Knockout));
    }

    #[test]
    fn pong_never_goes_negative() {
        let mut state = ReconciliationState::new(WINDOW);
        assert_eq!(state.on_pong(500, 400), 0);
        assert_eq!(state.ping_ms(), Some(0));
    }
}
