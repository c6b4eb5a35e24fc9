//! Game logic and session coordination for Trivium.
//!
//! - [`Game`]: the rules, as a pure state machine. Inputs go in, events
//!   come out, nothing else happens.
//! - [`Room`]: one game shared by concurrent connection handlers. It
//!   serializes inputs, runs the question timer and fans updates out to
//!   every player's [`Connection`].
//! - [`RoomManager`]: the set of live rooms of a server, with simple
//!   matchmaking.
//!
//! Questions come from a [`QuestionProvider`]; [`QuestionPool`] is the
//! in-memory one.

mod config;
mod connection;
mod error;
mod game;
mod manager;
pub mod questions;
mod room;
mod timer;

pub use config::{GameContent, GameOptions, LaunchStrategy, MAX_START_DELAY};
pub use connection::{Connection, UpdateSender};
pub use error::{ConnectionError, GameError, QuestionError, RoomError};
pub use game::{Game, Join, PlayerState, review_list};
pub use manager::RoomManager;
pub use questions::{
    QuestionHandle, QuestionInstance, QuestionPool, QuestionProvider, StaticQuestion,
    WeightedQuestions,
};
pub use room::{
    PlayerEvent, PlayerReplay, PlayerSummary, Replay, Room, RoomOutcome, RoomSize, Summary,
};
