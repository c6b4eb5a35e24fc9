//! Error types for the game and room layers.

use trivium_board::Category;
use trivium_protocol::{Phase, RoomId, Serial};

/// Why the game refused an input. The state is left untouched whenever
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The game left the lobby; new players can no longer enter.
    #[error("game already started")]
    AlreadyStarted,

    /// `start_game` on a game that is not waiting for players.
    #[error("game cannot start from phase {0}")]
    CannotStart(Phase),

    #[error("cannot start a game without players")]
    NoPlayers,

    /// An auto-launched lobby already has its target count.
    #[error("lobby is full")]
    LobbyFull,

    #[error("player {0} is not in this game")]
    UnknownPlayer(Serial),

    #[error("player {0} is disconnected")]
    Inactive(Serial),

    #[error("{event} not allowed in phase {phase}")]
    WrongPhase { event: &'static str, phase: Phase },

    #[error("not the turn of player {0}")]
    NotYourTurn(Serial),

    #[error("dice already thrown this turn")]
    DiceAlreadyThrown,

    #[error("dice not thrown yet")]
    DiceNotThrown,

    /// The requested tile is not among the destinations of the throw.
    #[error("tile {0} is not reachable")]
    UnreachableTile(usize),

    /// The question bank had nothing for the category.
    #[error("no question available for category {0}")]
    NoQuestion(Category),
}

/// Errors raised while building a question bank.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuestionError {
    #[error("question list is empty")]
    Empty,

    #[error("{questions} questions but {weights} weights")]
    WeightCount { questions: usize, weights: usize },

    /// Weights must be finite and non-negative, and not all zero.
    #[error("invalid weight {0}")]
    InvalidWeight(f64),
}

/// Errors raised by a [`Connection`](crate::Connection) when delivering an
/// update.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The receiving side is gone.
    #[error("connection closed")]
    Closed,
}

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A room with this id is already registered.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    /// A new player tried to enter after the game started.
    #[error("game in room {0} already started")]
    GameStarted(RoomId),

    /// A new player tried to enter a lobby that reached its target.
    #[error("room {0} is full")]
    Full(RoomId),

    /// `listen` was called a second time.
    #[error("room {0} is already listening")]
    AlreadyListening(RoomId),

    /// The room's loop has stopped and no longer accepts input.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    #[error(transparent)]
    Game(#[from] GameError),
}
