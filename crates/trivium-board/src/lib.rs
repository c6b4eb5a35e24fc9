//! Board graph for Trivium.
//!
//! The board is an immutable, undirected graph of tiles. A single pawn
//! walks it; after a dice throw the player picks one of the tiles
//! returned by [`Board::reachable`].
//!
//! # Key types
//!
//! - [`Board`]: the adjacency lists, with the move enumeration
//! - [`Reachable`]: legal destinations, each with the path leading there
//! - [`Category`] / [`TileCategories`]: the question topic of each tile

mod board;
mod category;
mod error;

pub use board::{Board, Reachable, TilePath, REFERENCE_TILES};
pub use category::{Category, TileCategories, NB_CATEGORIES};
pub use error::BoardError;
