//! # Trivium
//!
//! WebSocket server for Trivium, a turn-based multiplayer quiz game.
//!
//! Players share one pawn on a small board. The player whose turn it is
//! throws the dice and moves the pawn; every player then answers a
//! question of the tile's category. The first players to answer each
//! category correctly win.
//!
//! The game itself lives in [`trivium_room`]; this crate puts it behind
//! sockets. A client sends a [`JoinRequest`](trivium_protocol::JoinRequest)
//! as its first frame, then [`ClientEvent`](trivium_protocol::ClientEvent)s,
//! and receives [`ServerMessage`](trivium_protocol::ServerMessage) frames.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trivium::prelude::*;
//! use trivium::content;
//!
//! # async fn run() -> Result<(), TriviumError> {
//! let board = Board::reference();
//! let categories = content::cycled_categories(&board)?;
//! let questions = content::load_questions(std::path::Path::new("questions.json")).await?;
//! let content = GameContent::new(board, categories, std::sync::Arc::new(questions))?;
//!
//! let server = TriviumServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(content)
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod content;
mod error;
mod handler;
pub mod logging;
mod server;
pub mod transport;

pub use error::TriviumError;
pub use server::{TriviumServer, TriviumServerBuilder};

/// The types most servers need.
pub mod prelude {
    pub use crate::{TriviumError, TriviumServer};
    pub use trivium_board::{Board, Category, TileCategories};
    pub use trivium_protocol::{ClientEvent, JoinRequest, ServerEvent, ServerMessage};
    pub use trivium_room::{GameContent, GameOptions, LaunchStrategy};
}
