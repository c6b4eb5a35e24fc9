//! Board graph and move enumeration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::BoardError;

/// Number of tiles on the reference board.
pub const REFERENCE_TILES: usize = 19;

/// An immutable, undirected board graph.
///
/// Tiles are indexed `0..len()`. Adjacency lists are kept sorted so
/// that neighbour enumeration, and therefore [`Board::reachable`], is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    adjacency: Vec<Vec<usize>>,
}

impl Board {
    /// Builds a board of `nb_tiles` tiles from a list of undirected edges.
    ///
    /// Duplicate edges are merged. Self loops and out-of-range endpoints
    /// are rejected.
    pub fn new(
        nb_tiles: usize,
        edges: &[(usize, usize)],
    ) -> Result<Self, BoardError> {
        if nb_tiles == 0 {
            return Err(BoardError::Empty);
        }

        let mut adjacency = vec![Vec::new(); nb_tiles];
        for &(from, to) in edges {
            if from >= nb_tiles || to >= nb_tiles {
                return Err(BoardError::EdgeOutOfRange { from, to, nb_tiles });
            }
            if from == to {
                return Err(BoardError::SelfLoop(from));
            }
            adjacency[from].push(to);
            adjacency[to].push(from);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
            neighbors.dedup();
        }

        Ok(Self { adjacency })
    }

    /// The default 19-tile board: a ring with two shortcuts, 4-15 and 10-16.
    pub fn reference() -> Self {
        let mut edges: Vec<(usize, usize)> = (0..REFERENCE_TILES)
            .map(|tile| (tile, (tile + 1) % REFERENCE_TILES))
            .collect();
        edges.push((4, 15));
        edges.push((10, 16));

        Self::new(REFERENCE_TILES, &edges)
            .unwrap_or_else(|e| unreachable!("reference board is valid: {e}"))
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Always `false`: a board has at least one tile.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Returns `true` if `tile` is a valid index.
    pub fn contains(&self, tile: usize) -> bool {
        tile < self.adjacency.len()
    }

    /// Tiles adjacent to `tile`, in ascending order.
    ///
    /// # Panics
    /// Panics if `tile` is out of range.
    pub fn neighbors(&self, tile: usize) -> &[usize] {
        assert!(
            self.contains(tile),
            "tile {tile} is out of range for a board of {} tiles",
            self.len()
        );
        &self.adjacency[tile]
    }

    /// Enumerates the tiles reachable from `from` in exactly `steps` moves.
    ///
    /// Paths are expanded one layer at a time from an ordered frontier.
    /// A step never goes straight back to the tile it came from, but a
    /// path may revisit a tile seen two or more steps earlier. When
    /// several paths end on the same tile, the last one generated wins.
    ///
    /// # Panics
    /// Panics if `from` is out of range.
    pub fn reachable(&self, from: usize, steps: usize) -> Reachable {
        let mut frontier = vec![TilePath(vec![from])];
        // validates `from` even when `steps` is 0
        let _ = self.neighbors(from);

        for _ in 0..steps {
            let mut next = Vec::with_capacity(frontier.len() * 2);
            for path in &frontier {
                let origin = path.origin();
                for &candidate in self.neighbors(path.tile()) {
                    if Some(candidate) == origin {
                        continue;
                    }
                    next.push(path.extended(candidate));
                }
            }
            frontier = next;
        }

        let mut paths = BTreeMap::new();
        for path in frontier {
            paths.insert(path.tile(), path);
        }
        Reachable { paths }
    }
}

/// A walk on the board: the starting tile followed by every tile
/// crossed, ending on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TilePath(Vec<usize>);

impl TilePath {
    /// The destination (last tile).
    pub fn tile(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    /// The tile visited just before the destination, if any.
    pub fn origin(&self) -> Option<usize> {
        self.0.len().checked_sub(2).map(|i| self.0[i])
    }

    /// Number of tiles in the path, including the start.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: a path holds at least its starting tile.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    fn extended(&self, tile: usize) -> Self {
        let mut tiles = Vec::with_capacity(self.0.len() + 1);
        tiles.extend_from_slice(&self.0);
        tiles.push(tile);
        Self(tiles)
    }
}

impl From<TilePath> for Vec<usize> {
    fn from(path: TilePath) -> Self {
        path.0
    }
}

/// Result of [`Board::reachable`]: destination tile → path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reachable {
    paths: BTreeMap<usize, TilePath>,
}

impl Reachable {
    /// Legal destinations, in ascending order.
    pub fn tiles(&self) -> Vec<usize> {
        self.paths.keys().copied().collect()
    }

    /// The path recorded for `tile`, if it is reachable.
    pub fn path(&self, tile: usize) -> Option<&TilePath> {
        self.paths.get(&tile)
    }

    pub fn contains(&self, tile: usize) -> bool {
        self.paths.contains_key(&tile)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Consumes the set, returning the ordered tile → path map.
    pub fn into_paths(self) -> BTreeMap<usize, TilePath> {
        self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Board {
        Board::new(3, &[(0, 1), (0, 2), (1, 2)]).unwrap()
    }

    #[test]
    fn test_new_rejects_self_loop() {
        assert_eq!(Board::new(3, &[(1, 1)]), Err(BoardError::SelfLoop(1)));
    }

    #[test]
    fn test_new_rejects_out_of_range_edge() {
        assert!(matches!(
            Board::new(3, &[(0, 3)]),
            Err(BoardError::EdgeOutOfRange { nb_tiles: 3, .. })
        ));
    }

    #[test]
    fn test_new_rejects_empty_board() {
        assert_eq!(Board::new(0, &[]), Err(BoardError::Empty));
    }

    #[test]
    fn test_duplicate_edges_are_merged() {
        let board = Board::new(2, &[(0, 1), (1, 0)]).unwrap();
        assert_eq!(board.neighbors(0), &[1]);
        assert_eq!(board.neighbors(1), &[0]);
    }

    #[test]
    fn test_later_path_overwrites_earlier_one() {
        // 0 -> 1 -> 2 is generated before 0 -> 2 -> 1
        let reach = triangle().reachable(0, 2);
        assert_eq!(reach.tiles(), vec![1, 2]);
        assert_eq!(reach.path(1).unwrap().as_slice(), &[0, 2, 1]);
        assert_eq!(reach.path(2).unwrap().as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn test_path_may_return_after_two_steps() {
        let reach = triangle().reachable(0, 3);
        assert_eq!(reach.tiles(), vec![0]);
        assert_eq!(reach.path(0).unwrap().as_slice(), &[0, 2, 1, 0]);
    }

    #[test]
    fn test_tile_path_origin() {
        let reach = triangle().reachable(0, 1);
        let path = reach.path(2).unwrap();
        assert_eq!(path.origin(), Some(0));
        assert_eq!(path.tile(), 2);
        assert_eq!(path.len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_neighbors_out_of_range_panics() {
        triangle().neighbors(3);
    }
}
