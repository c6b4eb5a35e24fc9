//! Room manager: creates rooms, routes new players and collects the
//! outcome of finished games.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use trivium_protocol::{Phase, PlayerId, PlayerIdentity, RoomId};

use crate::{Connection, GameContent, GameOptions, Room, RoomError, RoomOutcome, Summary};

/// Counter for generating room ids.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Tracks every live room of a server.
///
/// Each room's [`Room::listen`] runs in its own task. When it returns,
/// the outcome is queued until [`RoomManager::reap`] collects it and
/// drops the room.
pub struct RoomManager {
    rooms: HashMap<RoomId, Arc<Room>>,
    options: GameOptions,
    content: GameContent,
    finished_tx: mpsc::UnboundedSender<(RoomId, RoomOutcome)>,
    finished_rx: mpsc::UnboundedReceiver<(RoomId, RoomOutcome)>,
}

impl RoomManager {
    /// Creates an empty manager. `options` and `content` are used for
    /// every room created without explicit options.
    pub fn new(options: GameOptions, content: GameContent) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            rooms: HashMap::new(),
            options,
            content,
            finished_tx,
            finished_rx,
        }
    }

    /// Creates a room with a generated id and the default options.
    pub fn create_room(&mut self) -> Arc<Room> {
        let room_id = RoomId(format!(
            "room-{}",
            NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed)
        ));
        self.spawn(room_id, self.options.clone())
    }

    /// Creates a room under a caller-chosen id.
    pub fn create_room_with(
        &mut self,
        room_id: RoomId,
        options: GameOptions,
    ) -> Result<Arc<Room>, RoomError> {
        if self.rooms.contains_key(&room_id) {
            return Err(RoomError::AlreadyExists(room_id));
        }
        Ok(self.spawn(room_id, options))
    }

    fn spawn(&mut self, room_id: RoomId, options: GameOptions) -> Arc<Room> {
        let room = Arc::new(Room::new(room_id.clone(), options, self.content.clone()));
        let finished = self.finished_tx.clone();
        let listener = Arc::clone(&room);
        tokio::spawn(async move {
            match listener.listen().await {
                Ok(outcome) => {
                    let _ = finished.send((listener.id().clone(), outcome));
                }
                Err(err) => {
                    tracing::warn!(room_id = %listener.id(), error = %err, "room loop failed");
                }
            }
        });

        self.rooms.insert(room_id.clone(), Arc::clone(&room));
        tracing::info!(%room_id, "room created");
        room
    }

    /// Options given to rooms created without explicit ones.
    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn room(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.get(room_id).cloned()
    }

    /// Joins the room registered under `room_id`, creating it with the
    /// default options on first use.
    ///
    /// The manager is locked only to find the room, never across the
    /// join itself.
    pub async fn join_room(
        manager: &Mutex<Self>,
        room_id: RoomId,
        identity: PlayerIdentity,
        connection: Box<dyn Connection>,
    ) -> Result<Arc<Room>, RoomError> {
        let room = {
            let mut manager = manager.lock().await;
            match manager.room(&room_id) {
                Some(room) => room,
                None => {
                    let options = manager.options.clone();
                    manager.spawn(room_id, options)
                }
            }
        };
        room.join(identity, connection).await?;
        Ok(room)
    }

    /// Finds a room still in its lobby or creates a new one, then joins
    /// the player.
    ///
    /// A player already known to some room is sent back there, so a
    /// dropped client reconnects to its game. Like
    /// [`join_room`](Self::join_room), the manager is unlocked while the
    /// player joins; a lobby that fills in the meantime is skipped.
    pub async fn join_or_create<C>(
        manager: &Mutex<Self>,
        identity: PlayerIdentity,
        connection: C,
    ) -> Result<Arc<Room>, RoomError>
    where
        C: Connection + Clone,
    {
        loop {
            let room = manager.lock().await.pick_room(&identity.id).await;
            match room.join(identity.clone(), Box::new(connection.clone())).await {
                Ok(_) => return Ok(room),
                Err(RoomError::GameStarted(_) | RoomError::Full(_)) => {
                    tracing::debug!(
                        room_id = %room.id(),
                        player = %identity.id,
                        "lobby filled, looking again"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The room `player` should go to: its own game if it is known
    /// somewhere, else the first lobby with a free seat, else a new room.
    async fn pick_room(&mut self, player: &PlayerId) -> Arc<Room> {
        let mut open = Vec::new();
        for room in self.rooms.values() {
            let summary = room.summary().await;
            if summary.players.iter().any(|p| &p.identity.id == player) {
                return Arc::clone(room);
            }
            let has_seat = summary
                .room_size
                .max
                .is_none_or(|max| summary.players.len() < max);
            if summary.phase == Phase::Waiting && has_seat {
                open.push(Arc::clone(room));
            }
        }
        open.sort_by(|a, b| a.id().cmp(b.id()));
        match open.into_iter().next() {
            Some(room) => room,
            None => self.create_room(),
        }
    }

    /// Asks a room to stop. It is dropped at the next [`reap`](Self::reap).
    pub fn terminate_room(&self, room_id: &RoomId) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        room.terminate();
        Ok(())
    }

    /// Drops the rooms whose loop has returned and hands back their
    /// outcomes.
    pub fn reap(&mut self) -> Vec<(RoomId, RoomOutcome)> {
        let mut finished = Vec::new();
        while let Ok((room_id, outcome)) = self.finished_rx.try_recv() {
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, natural_end = outcome.natural_end, "room closed");
            finished.push((room_id, outcome));
        }
        finished
    }

    /// Summaries of every live room.
    pub async fn summaries(&self) -> Vec<Summary> {
        let mut summaries = Vec::with_capacity(self.rooms.len());
        for room in self.rooms.values() {
            summaries.push(room.summary().await);
        }
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
