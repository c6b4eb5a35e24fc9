//! Room: one game behind a lock, plus the loop that feeds it.
//!
//! Joins are applied directly under the lock, so the caller learns right
//! away whether it got in. Everything else (actions, leaves, the question
//! timer, termination) goes through channels drained by
//! [`Room::listen`], one input at a time.
//!
//! ```text
//! join ────────────────────────────┐
//! submit_event ──→ events  ─┐      ▼
//! leave        ──→ leave   ─┼──→ listen ──→ Mutex<Game> ──→ Connection::send
//! terminate    ──→ terminate┘      ▲
//!                   QuestionTimer ─┘
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::time;
use tracing::{debug, info, warn};
use trivium_protocol::{
    ClientEvent, Phase, PlayerId, PlayerIdentity, QuestionId, QuestionReview, RoomId, Serial,
    ServerEvent, StateUpdate, Success,
};

use crate::timer::QuestionTimer;
use crate::{Connection, Game, GameContent, GameError, GameOptions, RoomError};

/// An action from a player, queued for the room loop.
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub player: PlayerId,
    pub event: ClientEvent,
}

/// Per-player record of a finished game, for persistence by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replay {
    pub room_id: RoomId,
    pub players: Vec<PlayerReplay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReplay {
    pub identity: PlayerIdentity,
    pub review: QuestionReview,
}

impl Replay {
    /// A replay with no player, returned for terminated games.
    pub fn empty(room_id: RoomId) -> Self {
        Self {
            room_id,
            players: Vec::new(),
        }
    }
}

/// How [`Room::listen`] ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomOutcome {
    pub replay: Replay,
    /// `true` if the game reached a winner, `false` if it was terminated.
    pub natural_end: bool,
}

/// Monitoring view of a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub room_id: RoomId,
    pub phase: Phase,
    pub player_turn: Option<PlayerIdentity>,
    pub players: Vec<PlayerSummary>,
    pub room_size: RoomSize,
    pub latest_question: Option<QuestionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSummary {
    pub serial: Serial,
    pub identity: PlayerIdentity,
    pub success: Success,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomSize {
    /// Connected players.
    pub current: usize,
    /// Lobby size that starts the game, `None` for manual launch.
    pub max: Option<usize>,
}

/// State guarded by the room lock.
struct Shared {
    room_id: RoomId,
    game: Game,
    connections: HashMap<Serial, Box<dyn Connection>>,
}

struct Inbox {
    leave: mpsc::UnboundedReceiver<PlayerId>,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    terminate: mpsc::UnboundedReceiver<()>,
}

/// A game session shared by its players' connection handlers.
///
/// Wrap it in an `Arc`, spawn [`Room::listen`] once, then call the other
/// methods from any task.
pub struct Room {
    id: RoomId,
    options: GameOptions,
    shared: Mutex<Shared>,
    leave_tx: mpsc::UnboundedSender<PlayerId>,
    event_tx: mpsc::UnboundedSender<PlayerEvent>,
    terminate_tx: mpsc::UnboundedSender<()>,
    inbox: std::sync::Mutex<Option<Inbox>>,
}

impl Room {
    pub fn new(id: RoomId, options: GameOptions, content: GameContent) -> Self {
        let game = Game::new(options, content);
        let options = game.options().clone();
        let (leave_tx, leave) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (terminate_tx, terminate) = mpsc::unbounded_channel();

        Self {
            shared: Mutex::new(Shared {
                room_id: id.clone(),
                game,
                connections: HashMap::new(),
            }),
            id,
            options,
            leave_tx,
            event_tx,
            terminate_tx,
            inbox: std::sync::Mutex::new(Some(Inbox {
                leave,
                events,
                terminate,
            })),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Options in effect, after validation.
    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    /// Adds a player with the connection updates should go to.
    ///
    /// A known identity is reconnected in any phase and its previous
    /// connection replaced. A new identity is refused with
    /// [`RoomError::GameStarted`] once the game has started, or
    /// [`RoomError::Full`] when an auto-launched lobby already has its
    /// target. When the join fills the lobby, the game starts after
    /// [`GameOptions::start_delay`]. The room stays unlocked during the
    /// delay.
    pub async fn join(
        &self,
        identity: PlayerIdentity,
        connection: Box<dyn Connection>,
    ) -> Result<Serial, RoomError> {
        let (serial, ready) = {
            let mut shared = self.shared.lock().await;
            let join = shared.game.join(identity).map_err(|err| match err {
                GameError::AlreadyStarted => RoomError::GameStarted(self.id.clone()),
                GameError::LobbyFull => RoomError::Full(self.id.clone()),
                other => RoomError::Game(other),
            })?;

            shared.connections.insert(join.serial, connection);
            shared.send_to(join.serial, join.private);
            shared.broadcast(join.broadcast);
            (join.serial, shared.game.ready_to_start())
        };

        if ready {
            if !self.options.start_delay.is_zero() {
                time::sleep(self.options.start_delay).await;
            }
            // A leave or a manual start may have happened meanwhile.
            let mut shared = self.shared.lock().await;
            if shared.game.ready_to_start() {
                let events = shared.game.start()?;
                shared.broadcast(events);
            }
        }
        Ok(serial)
    }

    /// Starts a game still in its lobby, whatever the launch strategy.
    pub async fn start_game(&self) -> Result<(), RoomError> {
        let mut shared = self.shared.lock().await;
        let events = shared.game.start()?;
        shared.broadcast(events);
        Ok(())
    }

    /// Queues the departure of `player`.
    ///
    /// Fails with [`RoomError::Unavailable`] once the loop has stopped.
    pub fn leave(&self, player: PlayerId) -> Result<(), RoomError> {
        self.leave_tx
            .send(player)
            .map_err(|_| RoomError::Unavailable(self.id.clone()))
    }

    /// Queues an action of `player`.
    ///
    /// Fails with [`RoomError::Unavailable`] once the loop has stopped.
    pub fn submit_event(&self, player: PlayerId, event: ClientEvent) -> Result<(), RoomError> {
        self.event_tx
            .send(PlayerEvent { player, event })
            .map_err(|_| RoomError::Unavailable(self.id.clone()))
    }

    /// Asks the loop to stop the game.
    pub fn terminate(&self) {
        if self.terminate_tx.send(()).is_err() {
            debug!(room_id = %self.id, "room already closed");
        }
    }

    /// Runs the room until the game ends or is terminated.
    ///
    /// May be called once per room.
    pub async fn listen(&self) -> Result<RoomOutcome, RoomError> {
        let inbox = self.inbox.lock().ok().and_then(|mut slot| slot.take());
        let Some(mut inbox) = inbox else {
            return Err(RoomError::AlreadyListening(self.id.clone()));
        };
        info!(room_id = %self.id, "room listening");

        let mut timer = QuestionTimer::new();
        timer.sync(self.shared.lock().await.game.question_deadline());

        loop {
            tokio::select! {
                Some(()) = inbox.terminate.recv() => {
                    let shared = self.shared.lock().await;
                    shared.broadcast(vec![ServerEvent::GameTerminated]);
                    info!(room_id = %self.id, "room terminated");
                    return Ok(RoomOutcome {
                        replay: Replay::empty(self.id.clone()),
                        natural_end: false,
                    });
                }
                Some(player) = inbox.leave.recv() => {
                    let mut shared = self.shared.lock().await;
                    shared.leave(&player);
                    if let Some(outcome) = shared.outcome() {
                        return Ok(outcome);
                    }
                    timer.sync(shared.game.question_deadline());
                }
                Some(PlayerEvent { player, event }) = inbox.events.recv() => {
                    let mut shared = self.shared.lock().await;
                    shared.apply(&player, event);
                    if let Some(outcome) = shared.outcome() {
                        return Ok(outcome);
                    }
                    timer.sync(shared.game.question_deadline());
                }
                () = timer.fired() => {
                    let mut shared = self.shared.lock().await;
                    let events = shared.game.on_question_timeout();
                    shared.broadcast(events);
                    timer.sync(shared.game.question_deadline());
                }
            }
        }
    }

    pub async fn summary(&self) -> Summary {
        let shared = self.shared.lock().await;
        let game = &shared.game;
        Summary {
            room_id: self.id.clone(),
            phase: game.phase(),
            player_turn: game
                .player_turn()
                .and_then(|serial| game.players().get(&serial))
                .map(|p| p.identity.clone()),
            players: game
                .players()
                .iter()
                .map(|(serial, p)| PlayerSummary {
                    serial: *serial,
                    identity: p.identity.clone(),
                    success: p.success,
                    connected: p.connected,
                })
                .collect(),
            room_size: RoomSize {
                current: game.active_count(),
                max: self.options.launch.target(),
            },
            latest_question: game.last_question(),
        }
    }
}

impl Shared {
    fn apply(&mut self, player: &PlayerId, event: ClientEvent) {
        let Some(serial) = self.game.serial_of(player) else {
            debug!(room_id = %self.room_id, %player, "event from unknown player");
            return;
        };
        let name = event.name();
        match self.game.handle(serial, event) {
            Ok(events) => self.broadcast(events),
            Err(err) => {
                debug!(
                    room_id = %self.room_id,
                    %serial,
                    event = name,
                    error = %err,
                    "event rejected"
                );
                self.send_to(
                    serial,
                    vec![ServerEvent::Rejected {
                        reason: err.to_string(),
                    }],
                );
            }
        }
    }

    fn leave(&mut self, player: &PlayerId) {
        let Some(serial) = self.game.serial_of(player) else {
            debug!(room_id = %self.room_id, %player, "leave from unknown player");
            return;
        };
        self.connections.remove(&serial);
        let events = self.game.leave(serial);
        self.broadcast(events);
    }

    /// `Some` once the game is over.
    fn outcome(&self) -> Option<RoomOutcome> {
        if self.game.phase() != Phase::Over {
            return None;
        }
        info!(room_id = %self.room_id, "game finished");
        let players = self
            .game
            .players()
            .values()
            .map(|p| PlayerReplay {
                identity: p.identity.clone(),
                review: p.review.clone(),
            })
            .collect();
        Some(RoomOutcome {
            replay: Replay {
                room_id: self.room_id.clone(),
                players,
            },
            natural_end: true,
        })
    }

    /// Sends `events` with the current state to every connected player.
    fn broadcast(&self, events: Vec<ServerEvent>) {
        if events.is_empty() {
            return;
        }
        let update = StateUpdate {
            events,
            state: self.game.state(),
        };
        for (serial, connection) in &self.connections {
            if !self.game.is_connected(*serial) {
                continue;
            }
            if let Err(err) = connection.send(&update) {
                warn!(room_id = %self.room_id, %serial, error = %err, "update not delivered");
            }
        }
    }

    fn send_to(&self, serial: Serial, events: Vec<ServerEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(connection) = self.connections.get(&serial) else {
            return;
        };
        let update = StateUpdate {
            events,
            state: self.game.state(),
        };
        if let Err(err) = connection.send(&update) {
            warn!(room_id = %self.room_id, %serial, error = %err, "update not delivered");
        }
    }
}
