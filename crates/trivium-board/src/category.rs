//! Question categories and the tile → category table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Board, BoardError};

/// Number of categories a player has to complete to win.
pub const NB_CATEGORIES: usize = 5;

/// A question topic, shown as a colour on the board.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Category {
    Purple,
    Green,
    Orange,
    Yellow,
    Blue,
}

impl Category {
    /// Every category, in index order.
    pub const ALL: [Category; NB_CATEGORIES] = [
        Category::Purple,
        Category::Green,
        Category::Orange,
        Category::Yellow,
        Category::Blue,
    ];

    /// Position of this category in a success array.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Purple => write!(f, "Purple"),
            Self::Green => write!(f, "Green"),
            Self::Orange => write!(f, "Orange"),
            Self::Yellow => write!(f, "Yellow"),
            Self::Blue => write!(f, "Blue"),
        }
    }
}

/// Maps every tile of a board to its category.
///
/// The table is configuration: there is no built-in default, callers
/// supply one entry per tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileCategories(Vec<Category>);

impl TileCategories {
    /// Checks that `categories` has exactly one entry per tile of `board`.
    pub fn new(
        board: &Board,
        categories: Vec<Category>,
    ) -> Result<Self, BoardError> {
        if categories.len() != board.len() {
            return Err(BoardError::CategoryCount {
                expected: board.len(),
                got: categories.len(),
            });
        }
        Ok(Self(categories))
    }

    /// Category of `tile`.
    ///
    /// # Panics
    /// Panics if `tile` is out of range.
    pub fn category(&self, tile: usize) -> Category {
        self.0[tile]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_index_matches_all_order() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_table_length_must_match_board() {
        let board = Board::new(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();
        let err = TileCategories::new(&board, vec![Category::Blue]).unwrap_err();
        assert_eq!(err, BoardError::CategoryCount { expected: 3, got: 1 });

        let table = TileCategories::new(
            &board,
            vec![Category::Blue, Category::Green, Category::Purple],
        )
        .unwrap();
        assert_eq!(table.category(1), Category::Green);
    }

    #[test]
    fn test_category_serializes_as_name() {
        let json = serde_json::to_string(&Category::Orange).unwrap();
        assert_eq!(json, "\"Orange\"");
    }
}
