//! Error types for the board layer.

/// Errors raised while building a board or its category table.
///
/// Querying a built board never fails; an out-of-range tile passed to
/// a query is a programming error and panics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// A board needs at least one tile.
    #[error("a board needs at least one tile")]
    Empty,

    /// An edge references a tile outside `0..nb_tiles`.
    #[error("edge {from}-{to} is out of range for a board of {nb_tiles} tiles")]
    EdgeOutOfRange {
        from: usize,
        to: usize,
        nb_tiles: usize,
    },

    /// An edge connects a tile to itself.
    #[error("tile {0} cannot be adjacent to itself")]
    SelfLoop(usize),

    /// The category table does not cover every tile exactly once.
    #[error("category table has {got} entries, the board has {expected} tiles")]
    CategoryCount { expected: usize, got: usize },
}
