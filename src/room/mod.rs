//! Authoritative rooms: one task per room stepping a shared fight at a fixed
//! rate and broadcasting its state to every member

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::physics::Arena;
use crate::game::{Fight, FightEvent, Intent, IntentUpdate, RoundConfig};
use crate::util::time::{tick_interval, SERVER_TPS};
use crate::ws::protocol::ServerMsg;

/// Fighters per room
pub const MAX_PLAYERS: usize = 2;
/// Name shown for a vacant slot
const VACANT_NAME: &str = "Player";
/// Ticks a room may stay empty before it closes
const EMPTY_ROOM_TICKS: u32 = SERVER_TPS;

/// Join failures; `reason()` is what goes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room id is required")]
    RoomRequired,

    #[error("Room is full")]
    RoomFull,

    #[error("Room closed")]
    RoomClosed,
}

impl RoomError {
    pub fn reason(&self) -> &'static str {
        match self {
            RoomError::RoomRequired => "room_required",
            RoomError::RoomFull => "room_full",
            RoomError::RoomClosed => "room_closed",
        }
    }
}

/// Message fanned out to every member of a room
#[derive(Debug, Clone)]
pub struct RoomBroadcast {
    /// Connection that should not receive this message
    pub except: Option<Uuid>,
    pub msg: ServerMsg,
}

impl RoomBroadcast {
    pub fn is_for(&self, conn_id: Uuid) -> bool {
        self.except != Some(conn_id)
    }
}

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        conn_id: Uuid,
        name: String,
        reply: oneshot::Sender<Result<u8, RoomError>>,
    },
    Input {
        conn_id: Uuid,
        pressed: IntentUpdate,
    },
    Leave {
        conn_id: Uuid,
    },
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: String,
    cmd_tx: mpsc::Sender<RoomCommand>,
    state_tx: broadcast::Sender<RoomBroadcast>,
    player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// The room task has stopped
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomBroadcast> {
        self.state_tx.subscribe()
    }

    /// Take the first free slot, returns it as 1 or 2
    pub async fn join(&self, conn_id: Uuid, name: String) -> Result<u8, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::Join {
                conn_id,
                name,
                reply,
            })
            .await
            .map_err(|_| RoomError::RoomClosed)?;
        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    pub async fn input(&self, conn_id: Uuid, pressed: IntentUpdate) -> Result<(), RoomError> {
        self.cmd_tx
            .send(RoomCommand::Input { conn_id, pressed })
            .await
            .map_err(|_| RoomError::RoomClosed)
    }

    pub async fn leave(&self, conn_id: Uuid) -> Result<(), RoomError> {
        self.cmd_tx
            .send(RoomCommand::Leave { conn_id })
            .await
            .map_err(|_| RoomError::RoomClosed)
    }
}

/// A successful join: the room, the slot taken and the room's update stream
pub struct Membership {
    pub handle: RoomHandle,
    pub slot: u8,
    pub updates: broadcast::Receiver<RoomBroadcast>,
}

/// Registry of all open rooms
pub struct RoomRegistry {
    rooms: Arc<DashMap<String, RoomHandle>>,
    arena: Arena,
}

impl RoomRegistry {
    pub fn new(arena: Arena) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            arena,
        }
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Join `room`, creating it on demand
    pub async fn join(&self, room: &str, conn_id: Uuid, name: &str) -> Result<Membership, RoomError> {
        let room = room.trim();
        if room.is_empty() {
            return Err(RoomError::RoomRequired);
        }

        // A room can close between lookup and join; one retry gets a fresh one
        for _ in 0..2 {
            let handle = self.get_or_open(room);
            let updates = handle.subscribe();
            match handle.join(conn_id, name.to_string()).await {
                Ok(slot) => {
                    return Ok(Membership {
                        handle,
                        slot,
                        updates,
                    })
                }
                Err(RoomError::RoomClosed) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(RoomError::RoomClosed)
    }

    fn get_or_open(&self, id: &str) -> RoomHandle {
        match self.rooms.entry(id.to_string()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                let handle = self.open(id);
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.open(id);
                entry.insert(handle.clone());
                handle
            }
        }
    }

    fn open(&self, id: &str) -> RoomHandle {
        let (room, handle) = Room::new(id.to_string(), self.arena);
        let rooms = Arc::clone(&self.rooms);
        let room_id = id.to_string();
        tokio::spawn(async move {
            room.run().await;
            rooms.remove_if(&room_id, |_, h| h.is_closed());
        });
        handle
    }
}

struct Seat {
    conn_id: Uuid,
    intent: Intent,
}

/// The authoritative room
pub struct Room {
    id: String,
    fight: Fight,
    seats: [Option<Seat>; MAX_PLAYERS],
    cmd_rx: mpsc::Receiver<RoomCommand>,
    state_tx: broadcast::Sender<RoomBroadcast>,
    player_count: Arc<AtomicUsize>,
    empty_ticks: u32,
}

impl Room {
    pub fn new(id: String, arena: Arena) -> (Self, RoomHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (state_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id: id.clone(),
            cmd_tx,
            state_tx: state_tx.clone(),
            player_count: player_count.clone(),
        };

        let room = Self {
            id,
            fight: Fight::new(
                [VACANT_NAME.to_string(), VACANT_NAME.to_string()],
                arena,
                RoundConfig::timed(SERVER_TPS),
            ),
            seats: [None, None],
            cmd_rx,
            state_tx,
            player_count,
            empty_ticks: 0,
        };

        (room, handle)
    }

    /// Run the tick loop until the room has been empty for a while
    pub async fn run(mut self) {
        info!(room = %self.id, "Room opened");

        let mut ticker = interval(tick_interval(SERVER_TPS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            self.process_commands();

            if self.seated() == 0 {
                self.empty_ticks += 1;
                if self.empty_ticks >= EMPTY_ROOM_TICKS {
                    break;
                }
                continue;
            }
            self.empty_ticks = 0;

            self.tick();
        }

        info!(room = %self.id, "Room closed");
    }

    fn process_commands(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                conn_id,
                name,
                reply,
            } => {
                let result = self.handle_join(conn_id, name);
                let _ = reply.send(result);
            }
            RoomCommand::Input { conn_id, pressed } => {
                if let Some(seat) = self.seat_mut(conn_id) {
                    seat.intent.apply(&pressed);
                }
            }
            RoomCommand::Leave { conn_id } => self.handle_leave(conn_id),
        }
    }

    fn handle_join(&mut self, conn_id: Uuid, name: String) -> Result<u8, RoomError> {
        if let Some(index) = self.index_of(conn_id) {
            return Ok(slot_number(index));
        }
        let index = self
            .seats
            .iter()
            .position(Option::is_none)
            .ok_or(RoomError::RoomFull)?;

        if let Some(fighter) = self.fight.fighter_mut(index) {
            fighter.name = name.clone();
        }
        self.seats[index] = Some(Seat {
            conn_id,
            intent: Intent::default(),
        });
        self.update_player_count();

        let slot = slot_number(index);
        info!(room = %self.id, slot, %name, "Player joined room");
        self.publish(Some(conn_id), ServerMsg::PeerJoined { name, slot });
        Ok(slot)
    }

    fn handle_leave(&mut self, conn_id: Uuid) {
        let Some(index) = self.index_of(conn_id) else {
            return;
        };
        self.seats[index] = None;
        self.fight.reset_fighter(index);
        if let Some(fighter) = self.fight.fighter_mut(index) {
            fighter.name = VACANT_NAME.to_string();
        }
        self.update_player_count();

        let slot = slot_number(index);
        info!(room = %self.id, slot, "Player left room");
        self.publish(None, ServerMsg::PeerLeft { slot });
    }

    /// One simulation step followed by a state broadcast
    fn tick(&mut self) {
        let intents = [self.intent(0), self.intent(1)];
        for event in self.fight.step(intents) {
            match event {
                FightEvent::KnockedOut(reason) => info!(room = %self.id, ?reason, "Knockout"),
                FightEvent::RoundReset => info!(room = %self.id, "Round reset"),
                FightEvent::Hit { attacker, result } => {
                    debug!(room = %self.id, attacker, damage = result.damage, "Hit")
                }
            }
        }
        self.publish(
            None,
            ServerMsg::State {
                room: self.id.clone(),
                snapshot: self.fight.snapshot(SERVER_TPS),
            },
        );
    }

    fn publish(&self, except: Option<Uuid>, msg: ServerMsg) {
        // No subscribers is fine
        let _ = self.state_tx.send(RoomBroadcast { except, msg });
    }

    fn intent(&self, index: usize) -> Option<Intent> {
        self.seats[index].as_ref().map(|seat| seat.intent)
    }

    fn index_of(&self, conn_id: Uuid) -> Option<usize> {
        self.seats
            .iter()
            .position(|s| s.as_ref().is_some_and(|seat| seat.conn_id == conn_id))
    }

    fn seat_mut(&mut self, conn_id: Uuid) -> Option<&mut Seat> {
        self.seats
            .iter_mut()
            .flatten()
            .find(|seat| seat.conn_id == conn_id)
    }

    fn seated(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    fn update_player_count(&self) {
        self.player_count.store(self.seated(), Ordering::Relaxed);
    }
}

fn slot_number(index: usize) -> u8 {
    index as u8 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::SPAWN_OFFSET;
    use std::time::Duration;

    fn room() -> (Room, RoomHandle) {
        Room::new("r1".into(), Arena::default())
    }

    #[test]
    fn error_reasons() {
        assert_eq!(RoomError::RoomRequired.reason(), "room_required");
        assert_eq!(RoomError::RoomFull.reason(), "room_full");
        assert_eq!(RoomError::RoomClosed.reason(), "room_closed");
    }

    #[test]
    fn slots_fill_in_order_and_third_is_rejected() {
        let (mut room, handle) = room();
        let mut updates = handle.subscribe();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(room.handle_join(a, "Ann".into()), Ok(1));
        assert_eq!(room.handle_join(b, "Bob".into()), Ok(2));
        assert_eq!(room.handle_join(c, "Cat".into()), Err(RoomError::RoomFull));
        // Joining twice keeps the slot
        assert_eq!(room.handle_join(a, "Ann".into()), Ok(1));
        assert_eq!(handle.player_count(), 2);

        let first = updates.try_recv().unwrap();
        assert_eq!(
            first.msg,
            ServerMsg::PeerJoined {
                name: "Ann".into(),
                slot: 1
            }
        );
        assert!(!first.is_for(a));
        assert!(first.is_for(b));
    }

    #[test]
    fn leaving_frees_and_resets_the_slot() {
        let (mut room, handle) = room();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        room.handle_join(a, "Ann".into()).unwrap();
        room.handle_join(b, "Bob".into()).unwrap();

        room.fight.fighter_mut(0).unwrap().x = 33.0;
        room.handle_command(RoomCommand::Input {
            conn_id: a,
            pressed: IntentUpdate {
                right: Some(true),
                ..IntentUpdate::default()
            },
        });
        assert_eq!(room.intent(0).map(|i| i.right), Some(true));

        let mut updates = handle.subscribe();
        room.handle_leave(a);
        assert_eq!(room.intent(0), None);
        assert_eq!(room.fight.fighters()[0].x, -SPAWN_OFFSET);
        assert_eq!(room.fight.fighters()[0].name, VACANT_NAME);
        assert_eq!(handle.player_count(), 1);
        assert_eq!(updates.try_recv().unwrap().msg, ServerMsg::PeerLeft { slot: 1 });

        // Freed slot is handed out again
        let c = Uuid::new_v4();
        assert_eq!(room.handle_join(c, "Cat".into()), Ok(1));
    }

    #[test]
    fn tick_broadcasts_state() {
        let (mut room, handle) = room();
        let mut updates = handle.subscribe();
        room.handle_join(Uuid::new_v4(), "Ann".into()).unwrap();
        let _peer_joined = updates.try_recv().unwrap();

        room.tick();
        match updates.try_recv().unwrap().msg {
            ServerMsg::State { room, snapshot } => {
                assert_eq!(room, "r1");
                assert_eq!(snapshot.players.len(), 2);
                assert_eq!(snapshot.players[0].name, "Ann");
                assert_eq!(snapshot.players[1].name, VACANT_NAME);
                assert!(!snapshot.ko);
                assert_eq!(snapshot.ko_reason, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn registry_runs_rooms_end_to_end() {
        let registry = RoomRegistry::new(Arena::default());
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(
            registry.join("  ", a, "Ann").await.err(),
            Some(RoomError::RoomRequired)
        );

        let mut ann = registry.join("r1", a, "Ann").await.unwrap();
        assert_eq!(ann.slot, 1);
        let bob = registry.join("r1", b, "Bob").await.unwrap();
        assert_eq!(bob.slot, 2);
        assert_eq!(
            registry.join("r1", c, "Cat").await.err(),
            Some(RoomError::RoomFull)
        );
        assert_eq!(registry.active_rooms(), 1);
        assert_eq!(registry.total_players(), 2);

        ann.handle
            .input(
                a,
                IntentUpdate {
                    right: Some(true),
                    ..IntentUpdate::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut latest = None;
        while let Ok(update) = ann.updates.try_recv() {
            if let ServerMsg::State { snapshot, .. } = update.msg {
                latest = Some(snapshot);
            }
        }
        let snapshot = latest.expect("room should broadcast state");
        assert!(snapshot.players[0].x > -SPAWN_OFFSET);
        assert_eq!(snapshot.players[1].name, "Bob");

        tokio_test::assert_ok!(ann.handle.leave(a).await);
        tokio_test::assert_ok!(bob.handle.leave(b).await);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(registry.active_rooms(), 0);
        assert!(ann.handle.is_closed());
    }
}
