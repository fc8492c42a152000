//! Board representation for both grid levels.
//!
//! This module contains:
//! - Player marks and cells
//! - The 3x3 sub-board and its result
//! - The 8-line scan shared by sub-board and macro-board detection

use serde::{Deserialize, Serialize};

/// Number of cells in a sub-board, and of sub-boards in the macro-board.
pub const GRID_SIZE: usize = 9;

/// Every winning line of a 3x3 grid in row-major indices.
pub const LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// A player's symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// First player, always opens the match
    X,
    /// Second player
    O,
}

impl Mark {
    /// Both marks in turn order
    pub const ALL: [Mark; 2] = [Mark::X, Mark::O];

    /// The other player's mark
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Mark::X => 'X',
            Mark::O => 'O',
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A single cell; `None` is empty.
pub type Cell = Option<Mark>;

/// Result of one sub-board, derived from its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubBoardResult {
    /// Three identical marks in a line
    Won(Mark),
    /// All nine cells filled without a line
    Drawn,
    /// Still playable
    #[default]
    Undecided,
}

impl SubBoardResult {
    pub fn is_decided(self) -> bool {
        !matches!(self, SubBoardResult::Undecided)
    }

    /// The winning mark, if any. A drawn board has none.
    pub fn winner(self) -> Option<Mark> {
        match self {
            SubBoardResult::Won(mark) => Some(mark),
            _ => None,
        }
    }
}

/// One of the nine inner 3x3 grids, cells in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubBoard {
    cells: [Cell; GRID_SIZE],
}

impl SubBoard {
    /// Create an empty sub-board
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sub-board from explicit cells
    pub fn from_cells(cells: [Cell; GRID_SIZE]) -> Self {
        Self { cells }
    }

    /// Get a cell, `None` for an out-of-range index or an empty cell
    pub fn get(&self, index: usize) -> Cell {
        self.cells.get(index).copied().flatten()
    }

    pub fn is_empty_at(&self, index: usize) -> bool {
        matches!(self.cells.get(index), Some(None))
    }

    /// Return a copy of this sub-board with `mark` written at `index`.
    ///
    /// Out-of-range indices leave the board unchanged.
    pub fn with_mark(&self, index: usize, mark: Mark) -> Self {
        let mut cells = self.cells;
        if let Some(cell) = cells.get_mut(index) {
            *cell = Some(mark);
        }
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell; GRID_SIZE] {
        &self.cells
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Scan the 8 lines: first complete line wins, else drawn when full.
    pub fn result(&self) -> SubBoardResult {
        match winning_line(&self.cells) {
            Some(mark) => SubBoardResult::Won(mark),
            None if self.is_full() => SubBoardResult::Drawn,
            None => SubBoardResult::Undecided,
        }
    }
}

/// The first line of three identical marks in a 3x3 grid.
///
/// Empty cells never match, so only exact mark equality across a full line counts.
pub fn winning_line(grid: &[Option<Mark>; GRID_SIZE]) -> Option<Mark> {
    LINES.iter().find_map(|&[a, b, c]| match grid[a] {
        Some(mark) if grid[b] == Some(mark) && grid[c] == Some(mark) => Some(mark),
        _ => None,
    })
}

/// The nine sub-boards.
pub type MacroBoard = [SubBoard; GRID_SIZE];

/// Indices of every undecided sub-board, in ascending order.
pub fn available_sub_boards(sub_results: &[SubBoardResult; GRID_SIZE]) -> Vec<usize> {
    sub_results
        .iter()
        .enumerate()
        .filter(|(_, result)| !result.is_decided())
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: Cell = Some(Mark::X);
    const O: Cell = Some(Mark::O);
    const E: Cell = None;

    #[test]
    fn test_top_row_wins() {
        let board = SubBoard::from_cells([X, X, X, E, E, E, E, E, E]);
        assert_eq!(board.result(), SubBoardResult::Won(Mark::X));
    }

    #[test]
    fn test_full_board_without_line_is_drawn() {
        let board = SubBoard::from_cells([X, O, X, X, O, O, O, X, X]);
        assert_eq!(board.result(), SubBoardResult::Drawn);
    }

    #[test]
    fn test_partial_board_without_line_is_undecided() {
        let board = SubBoard::from_cells([X, O, X, E, O, E, O, X, E]);
        assert_eq!(board.result(), SubBoardResult::Undecided);
        assert_eq!(SubBoard::new().result(), SubBoardResult::Undecided);
    }

    #[test]
    fn test_every_line_detected() {
        for line in LINES {
            let mut cells = [E; GRID_SIZE];
            for index in line {
                cells[index] = O;
            }
            assert_eq!(
                SubBoard::from_cells(cells).result(),
                SubBoardResult::Won(Mark::O),
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_with_mark_copies() {
        let board = SubBoard::new();
        let next = board.with_mark(4, Mark::O);
        assert!(board.is_empty_at(4));
        assert_eq!(next.get(4), Some(Mark::O));
        assert_eq!(next.with_mark(9, Mark::X), next);
    }

    #[test]
    fn test_available_sub_boards_skips_decided() {
        let mut results = [SubBoardResult::Undecided; GRID_SIZE];
        results[1] = SubBoardResult::Drawn;
        results[5] = SubBoardResult::Won(Mark::X);
        assert_eq!(available_sub_boards(&results), vec![0, 2, 3, 4, 6, 7, 8]);
    }

    #[test]
    fn test_mark_serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&Mark::X).unwrap(), "\"X\"");
        assert_eq!(Mark::O.opponent(), Mark::X);
    }
}
