//! Game options and the static content a game is played with.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trivium_board::{Board, BoardError, NB_CATEGORIES, TileCategories};

use crate::QuestionProvider;

/// Longest pause allowed between the last join and the first turn.
pub const MAX_START_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// GameOptions
// ---------------------------------------------------------------------------

/// How a game leaves the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum LaunchStrategy {
    /// Starts by itself once `players` players have joined.
    Auto { players: usize },
    /// Starts only when [`Room::start_game`](crate::Room::start_game) is
    /// called. The lobby has no size limit.
    Manual,
}

impl LaunchStrategy {
    /// Lobby size that triggers the start, `None` for manual games.
    pub fn target(self) -> Option<usize> {
        match self {
            Self::Auto { players } => Some(players),
            Self::Manual => None,
        }
    }
}

/// Tuning knobs of one game.
///
/// Missing fields fall back to [`GameOptions::default`] when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    pub launch: LaunchStrategy,

    /// How long players get to answer before missing answers count as
    /// wrong.
    pub question_timeout: Duration,

    /// Highest dice face. Throws are uniform in `1..=max_dice_face`.
    pub max_dice_face: u8,

    /// Whether the game end carries each player's review list.
    pub show_review: bool,

    /// Categories every player owns from the start, in category order.
    /// Shortens games for demos and tests.
    pub start_successes: usize,

    /// Pause between the join that fills the lobby and the game start,
    /// so the last joiner's client can render the lobby first.
    pub start_delay: Duration,

    /// Seeds the dice and question draws. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            launch: LaunchStrategy::Auto { players: 2 },
            question_timeout: Duration::from_secs(60),
            max_dice_face: 3,
            show_review: true,
            start_successes: 0,
            start_delay: Duration::from_millis(10),
            seed: None,
        }
    }
}

impl GameOptions {
    /// Clamps out-of-range values into something playable.
    pub(crate) fn validated(mut self) -> Self {
        if let LaunchStrategy::Auto { players } = &mut self.launch {
            if *players == 0 {
                tracing::warn!("auto launch with 0 players, using 1");
                *players = 1;
            }
        }
        if self.max_dice_face == 0 {
            tracing::warn!("max_dice_face is 0, using 1");
            self.max_dice_face = 1;
        }
        if self.start_successes > NB_CATEGORIES {
            tracing::warn!(
                start_successes = self.start_successes,
                "start_successes above category count, clamping"
            );
            self.start_successes = NB_CATEGORIES;
        }
        if self.start_delay > MAX_START_DELAY {
            tracing::warn!(
                start_delay_ms = self.start_delay.as_millis() as u64,
                "start_delay too long, clamping"
            );
            self.start_delay = MAX_START_DELAY;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// GameContent
// ---------------------------------------------------------------------------

/// Read-only material shared by every game of a server: the board, the
/// category of each tile and the question bank.
#[derive(Clone)]
pub struct GameContent {
    pub board: Arc<Board>,
    pub categories: Arc<TileCategories>,
    pub questions: Arc<dyn QuestionProvider>,
}

impl GameContent {
    /// Bundles the content after checking that the category table covers
    /// the board.
    pub fn new(
        board: Board,
        categories: TileCategories,
        questions: Arc<dyn QuestionProvider>,
    ) -> Result<Self, BoardError> {
        if categories.len() != board.len() {
            return Err(BoardError::CategoryCount {
                expected: board.len(),
                got: categories.len(),
            });
        }
        Ok(Self {
            board: Arc::new(board),
            categories: Arc::new(categories),
            questions,
        })
    }
}

impl fmt::Debug for GameContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameContent")
            .field("tiles", &self.board.len())
            .finish_non_exhaustive()
    }
}
