//! Core game state and rules.
//!
//! `GameState` is replaced, never edited: `apply_move` and `undo` both return a
//! fresh value and leave the receiver untouched.

use crate::board::{
    available_sub_boards, winning_line, MacroBoard, Mark, SubBoard, SubBoardResult, GRID_SIZE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of the whole match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Won(Mark),
    Drawn,
    #[default]
    InProgress,
}

impl Outcome {
    pub fn is_decided(self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

/// One entry of the move log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub sub_index: usize,
    pub cell_index: usize,
    pub mark: Mark,
}

/// Why a move cannot be played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MoveError {
    #[error("Game is over")]
    GameOver,

    #[error("Index out of range")]
    OutOfRange,

    #[error("Board {0} is already decided")]
    SubBoardDecided(usize),

    #[error("Cell is already taken")]
    CellOccupied,

    #[error("Next move must be in board {}", .forced + 1)]
    WrongSubBoard { forced: usize },
}

/// The complete game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// All nine sub-boards
    pub board: MacroBoard,
    /// Derived result of each sub-board
    pub sub_results: [SubBoardResult; GRID_SIZE],
    /// Whose move is next
    pub turn: Mark,
    /// Sub-board the next move is confined to, `None` for free choice
    pub forced_sub_index: Option<usize>,
    /// Append-only move log
    pub history: Vec<MoveRecord>,
    pub outcome: Outcome,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Create the initial state: empty board, X to move, free choice.
    pub fn new() -> Self {
        Self {
            board: [SubBoard::new(); GRID_SIZE],
            sub_results: [SubBoardResult::Undecided; GRID_SIZE],
            turn: Mark::X,
            forced_sub_index: None,
            history: Vec::new(),
            outcome: Outcome::InProgress,
        }
    }

    /// Explain why a move would be rejected, or `Ok` if it is legal.
    pub fn check_move(&self, sub_index: usize, cell_index: usize) -> Result<(), MoveError> {
        if self.outcome.is_decided() {
            return Err(MoveError::GameOver);
        }
        if sub_index >= GRID_SIZE || cell_index >= GRID_SIZE {
            return Err(MoveError::OutOfRange);
        }
        if self.sub_results[sub_index].is_decided() {
            return Err(MoveError::SubBoardDecided(sub_index));
        }
        if !self.board[sub_index].is_empty_at(cell_index) {
            return Err(MoveError::CellOccupied);
        }
        match self.forced_sub_index {
            Some(forced) if forced != sub_index => Err(MoveError::WrongSubBoard { forced }),
            _ => Ok(()),
        }
    }

    pub fn is_legal_move(&self, sub_index: usize, cell_index: usize) -> bool {
        self.check_move(sub_index, cell_index).is_ok()
    }

    /// Play `mark` at the given cell.
    ///
    /// An illegal move returns an identical copy of `self`; use
    /// [`GameState::is_legal_move`] to tell the two cases apart.
    pub fn apply_move(&self, sub_index: usize, cell_index: usize, mark: Mark) -> GameState {
        if !self.is_legal_move(sub_index, cell_index) {
            return self.clone();
        }

        let mut board = self.board;
        board[sub_index] = board[sub_index].with_mark(cell_index, mark);

        let mut sub_results = self.sub_results;
        sub_results[sub_index] = board[sub_index].result();

        let outcome = macro_outcome(&sub_results);

        // The cell played picks the opponent's board, unless that board is closed
        let forced_sub_index = if outcome.is_decided() || sub_results[cell_index].is_decided() {
            None
        } else {
            Some(cell_index)
        };

        let mut history = self.history.clone();
        history.push(MoveRecord {
            sub_index,
            cell_index,
            mark,
        });

        GameState {
            board,
            sub_results,
            turn: mark.opponent(),
            forced_sub_index,
            history,
            outcome,
        }
    }

    /// Take back the last move by replaying the rest of the history from scratch.
    pub fn undo(&self) -> GameState {
        let Some((_, kept)) = self.history.split_last() else {
            return self.clone();
        };

        kept.iter().fold(GameState::new(), |state, record| {
            state.apply_move(record.sub_index, record.cell_index, record.mark)
        })
    }

    /// Indices of every sub-board still open for play
    pub fn available_sub_boards(&self) -> Vec<usize> {
        available_sub_boards(&self.sub_results)
    }

    /// Whether the next move may land anywhere in `sub_index`
    pub fn can_play_in(&self, sub_index: usize) -> bool {
        if self.outcome.is_decided() || sub_index >= GRID_SIZE {
            return false;
        }
        if self.sub_results[sub_index].is_decided() {
            return false;
        }
        self.forced_sub_index.map_or(true, |forced| forced == sub_index)
    }

    /// Every legal `(sub_index, cell_index)` pair
    pub fn legal_moves(&self) -> Vec<(usize, usize)> {
        (0..GRID_SIZE)
            .filter(|&sub| self.can_play_in(sub))
            .flat_map(|sub| {
                (0..GRID_SIZE)
                    .filter(move |&cell| self.board[sub].is_empty_at(cell))
                    .map(move |cell| (sub, cell))
            })
            .collect()
    }

    pub fn occupied_cells(&self) -> usize {
        self.board.iter().map(SubBoard::occupied).sum()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_decided()
    }

    pub fn winner(&self) -> Option<Mark> {
        match self.outcome {
            Outcome::Won(mark) => Some(mark),
            _ => None,
        }
    }
}

/// Outcome of the macro-board from the sub-board results.
///
/// Drawn sub-boards never count toward a line; the match is drawn once every
/// sub-board is decided without one.
pub fn macro_outcome(sub_results: &[SubBoardResult; GRID_SIZE]) -> Outcome {
    let winners = sub_results.map(SubBoardResult::winner);
    match winning_line(&winners) {
        Some(mark) => Outcome::Won(mark),
        None if sub_results.iter().all(|r| r.is_decided()) => Outcome::Drawn,
        None => Outcome::InProgress,
    }
}
