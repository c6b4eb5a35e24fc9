//! Identity and state types shared by the server and its clients.
//!
//! Everything in this module travels on the wire as part of a
//! [`StateUpdate`](crate::StateUpdate), so each type carries serde
//! attributes chosen for the JSON shape clients expect.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use trivium_board::{Category, NB_CATEGORIES};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable external identifier of a player.
///
/// Assigned by the caller at the first connection and presented again
/// on every reconnection, so a dropped client finds its progress back.
/// `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Caller-assigned identifier of a room (one game instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Room-local player handle, handed out in join order.
///
/// Unlike [`PlayerId`], a serial is meaningless outside its room. It is
/// what events refer to, and its ordering defines the turn rotation.
///
/// Serials key several maps, which JSON writes with string keys. Inside
/// internally tagged enums serde buffers those keys as strings, so
/// deserialization accepts both `3` and `"3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Serial(pub u32);

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Serial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SerialVisitor;

        impl Visitor<'_> for SerialVisitor {
            type Value = Serial;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a player serial, as a number or a numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Serial, E> {
                u32::try_from(v)
                    .map(Serial)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Serial, E> {
                u32::try_from(v)
                    .map(Serial)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Serial, E> {
                v.parse()
                    .map(Serial)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(SerialVisitor)
    }
}

/// Identifier of a question in the external question bank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct QuestionId(pub i64);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q-{}", self.0)
    }
}

/// Who a player is: the stable id plus the display name ("pseudo"),
/// which may change from one connection to the next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub pseudo: String,
}

impl PlayerIdentity {
    pub fn new(id: impl Into<String>, pseudo: impl Into<String>) -> Self {
        Self {
            id: PlayerId(id.into()),
            pseudo: pseudo.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Position of a game in its state machine.
///
/// ```text
/// Waiting → Throwing → Question → Result ─┬→ Throwing (next turn)
///                                         └→ Over
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// In the lobby, players may still join.
    #[default]
    Waiting,
    /// Start of a turn: the current player throws the dice, then moves.
    Throwing,
    /// A question is shown and its timer runs.
    Question,
    /// Players review the answers before the next turn.
    Result,
    /// Someone won. Terminal.
    Over,
}

impl Phase {
    /// `true` once the game has left the lobby.
    pub fn has_started(self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Throwing => write!(f, "Throwing"),
            Self::Question => write!(f, "Question"),
            Self::Result => write!(f, "Result"),
            Self::Over => write!(f, "Over"),
        }
    }
}

// ---------------------------------------------------------------------------
// Player progress
// ---------------------------------------------------------------------------

/// The categories a player has answered correctly at least once.
///
/// Bits only ever go from `false` to `true` during a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Success(pub [bool; NB_CATEGORIES]);

impl Success {
    /// Marks `category` as completed. Never clears a bit.
    pub fn mark(&mut self, category: Category) {
        self.0[category.index()] = true;
    }

    pub fn has(&self, category: Category) -> bool {
        self.0[category.index()]
    }

    /// Number of completed categories.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|done| **done).count()
    }

    /// `true` when every category is completed: the player wins.
    pub fn is_done(&self) -> bool {
        self.0.iter().all(|done| *done)
    }
}

/// One question presented to a player, and whether they got it right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: QuestionId,
    pub correct: bool,
}

/// A player's history over the game, plus the questions they flagged
/// for later review.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionReview {
    /// Every question shown to the player, in order.
    pub history: Vec<QuestionRecord>,
    /// Questions the player asked to review (at most
    /// [`QuestionReview::MAX_MARKED`]).
    pub marked: Vec<QuestionId>,
}

impl QuestionReview {
    /// Cap on the marked list, and on the end-of-game review list.
    pub const MAX_MARKED: usize = 3;

    /// `true` while the player may still flag a question.
    pub fn can_mark(&self) -> bool {
        self.marked.len() < Self::MAX_MARKED
    }
}

/// Public view of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub name: String,
    pub review: QuestionReview,
    pub success: Success,
    /// `true` when the player is disconnected but kept in the game.
    pub inactive: bool,
}

/// Snapshot of a game, sent alongside every batch of events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameState {
    pub players: BTreeMap<Serial, PlayerStatus>,
    pub pawn_tile: usize,
    /// `None` until the game has started.
    pub player_turn: Option<Serial>,
    pub phase: Phase,
}
