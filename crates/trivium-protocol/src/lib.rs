//! Wire protocol for Trivium.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`], [`Serial`], [`QuestionId`])
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): closed sum types,
//!   tagged explicitly in JSON
//! - **State** ([`GameState`], [`StateUpdate`]): the snapshot sent with
//!   every batch of events
//! - **Codec** ([`Codec`], [`JsonCodec`]) and [`ProtocolError`]
//!
//! # Architecture
//!
//! The protocol layer knows nothing about rooms or sockets:
//!
//! ```text
//! socket (bytes) → Protocol (ClientEvent) → Room → Protocol (StateUpdate) → socket
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{
    AnswerResult, ClientEvent, JoinRequest, ServerEvent, ServerMessage, StateUpdate,
};
pub use types::{
    GameState, Phase, PlayerId, PlayerIdentity, PlayerStatus, QuestionId,
    QuestionRecord, QuestionReview, RoomId, Serial, Success,
};

// Board types that appear in events.
pub use trivium_board::{Category, NB_CATEGORIES};
