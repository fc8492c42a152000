//! Glue between the rules engine and the peer channel.
//!
//! The controller owns the live `GameState` for one match. Local moves are
//! validated and applied immediately, then handed back as a [`PeerMessage`] for
//! the caller to send; remote moves are re-validated before they touch state.

use crate::actions::PeerMessage;
use crate::board::Mark;
use crate::game::{GameState, MoveError, MoveRecord};
use crate::negotiator::ConnectionStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// How long transient notices stay visible
pub const NOTICE_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Both marks are played from this seat
    Local,
    /// One mark is ours, the other arrives over the peer channel
    Online { local_mark: Mark },
}

/// Why a local request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Waiting for connection...")]
    NotConnected,

    #[error("Not your turn!")]
    NotYourTurn,

    #[error("Invalid move! {0}")]
    IllegalMove(#[from] MoveError),

    #[error("Only available in local games")]
    LocalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    /// Clears itself after a short while
    Transient,
    /// Stays until the match ends
    Persistent,
}

/// A message for the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    /// Milliseconds since the Unix epoch; `None` for persistent notices
    pub expires_at: Option<u64>,
}

/// Game state plus everything needed to play it over a peer link
#[derive(Debug, Clone)]
pub struct GameController {
    mode: GameMode,
    state: GameState,
    connection: ConnectionStatus,
    notice: Option<Notice>,
    notice_duration: Duration,
}

impl GameController {
    /// A hot-seat match; always considered connected
    pub fn local() -> Self {
        Self::with_mode(GameMode::Local, ConnectionStatus::Connected)
    }

    /// An online match where this seat plays `local_mark`
    pub fn online(local_mark: Mark) -> Self {
        Self::with_mode(GameMode::Online { local_mark }, ConnectionStatus::Connecting)
    }

    fn with_mode(mode: GameMode, connection: ConnectionStatus) -> Self {
        Self {
            mode,
            state: GameState::new(),
            connection,
            notice: None,
            notice_duration: NOTICE_DURATION,
        }
    }

    pub fn with_notice_duration(mut self, duration: Duration) -> Self {
        self.notice_duration = duration;
        self
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Our mark in an online match
    pub fn local_mark(&self) -> Option<Mark> {
        match self.mode {
            GameMode::Local => None,
            GameMode::Online { local_mark } => Some(local_mark),
        }
    }

    /// Whether the seat may move now (always true locally while in progress)
    pub fn is_local_turn(&self) -> bool {
        !self.state.is_finished() && self.local_mark().map_or(true, |m| m == self.state.turn)
    }

    /// Record the negotiator's externally visible status.
    pub fn set_connection(&mut self, status: ConnectionStatus, now: u64) {
        if self.mode == GameMode::Local {
            return;
        }
        self.connection = status;
        match status {
            ConnectionStatus::Connected => self.notice = None,
            ConnectionStatus::Disconnected => {
                self.notice = Some(Notice {
                    kind: NoticeKind::Persistent,
                    message: "Connection lost. Start a new match to play again.".to_string(),
                    expires_at: None,
                });
            }
            ConnectionStatus::Connecting => {
                debug!(now, "Waiting for peer");
            }
        }
    }

    /// This seat left the match. Unlike a lost connection no notice is raised.
    pub fn leave(&mut self) {
        if self.mode == GameMode::Local {
            return;
        }
        self.connection = ConnectionStatus::Disconnected;
        self.notice = None;
    }

    /// Play a move from this seat.
    ///
    /// Returns the message to send to the peer in online mode. A refused move
    /// leaves state untouched and raises a transient notice.
    pub fn attempt_local_move(
        &mut self,
        sub_index: usize,
        cell_index: usize,
        now: u64,
    ) -> Result<Option<PeerMessage>, Rejection> {
        match self.try_local_move(sub_index, cell_index, now) {
            Ok(message) => Ok(message),
            Err(rejection) => {
                self.raise(rejection, now);
                Err(rejection)
            }
        }
    }

    fn try_local_move(
        &mut self,
        sub_index: usize,
        cell_index: usize,
        now: u64,
    ) -> Result<Option<PeerMessage>, Rejection> {
        if let GameMode::Online { local_mark } = self.mode {
            if self.connection != ConnectionStatus::Connected {
                return Err(Rejection::NotConnected);
            }
            if self.state.turn != local_mark {
                return Err(Rejection::NotYourTurn);
            }
        }

        self.state.check_move(sub_index, cell_index)?;
        let mark = self.state.turn;
        self.state = self.state.apply_move(sub_index, cell_index, mark);

        let record = MoveRecord {
            sub_index,
            cell_index,
            mark,
        };
        Ok(match self.mode {
            GameMode::Local => None,
            GameMode::Online { .. } => Some(PeerMessage::from_record(record, now)),
        })
    }

    /// Apply a message received from the peer.
    ///
    /// Malformed or illegal messages are logged and dropped; nothing is sent
    /// back. Returns the move that was applied, if any.
    pub fn on_remote_message(&mut self, text: &str) -> Option<MoveRecord> {
        let GameMode::Online { local_mark } = self.mode else {
            warn!("Ignoring peer message in a local game");
            return None;
        };

        let message = match PeerMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed peer message: {}", e);
                return None;
            }
        };

        let PeerMessage::Move {
            sub_index,
            cell_index,
            mark,
            ..
        } = message;
        let (sub_index, cell_index) = (usize::from(sub_index), usize::from(cell_index));

        if mark != local_mark.opponent() || mark != self.state.turn {
            debug!(?mark, turn = ?self.state.turn, "Dropping out-of-turn remote move");
            return None;
        }
        if let Err(e) = self.state.check_move(sub_index, cell_index) {
            debug!(sub_index, cell_index, "Dropping illegal remote move: {}", e);
            return None;
        }

        self.state = self.state.apply_move(sub_index, cell_index, mark);
        Some(MoveRecord {
            sub_index,
            cell_index,
            mark,
        })
    }

    /// Take back the last move (local games only)
    pub fn undo(&mut self, now: u64) -> Result<(), Rejection> {
        self.local_only(now)?;
        self.state = self.state.undo();
        Ok(())
    }

    /// Start over from an empty board (local games only)
    pub fn new_game(&mut self, now: u64) -> Result<(), Rejection> {
        self.local_only(now)?;
        self.state = GameState::new();
        self.notice = None;
        Ok(())
    }

    fn local_only(&mut self, now: u64) -> Result<(), Rejection> {
        if self.mode == GameMode::Local {
            Ok(())
        } else {
            self.raise(Rejection::LocalOnly, now);
            Err(Rejection::LocalOnly)
        }
    }

    fn raise(&mut self, rejection: Rejection, now: u64) {
        // A lost connection outranks short-lived hints
        if matches!(&self.notice, Some(n) if n.kind == NoticeKind::Persistent) {
            return;
        }
        self.notice = Some(Notice {
            kind: NoticeKind::Transient,
            message: rejection.to_string(),
            expires_at: Some(now + self.notice_duration.as_millis() as u64),
        });
    }

    /// When the current notice lapses, if it is transient
    pub fn notice_expires_at(&self) -> Option<u64> {
        self.notice.as_ref().and_then(|n| n.expires_at)
    }

    /// The notice to show at `now`, dropping one that has expired
    pub fn notice(&mut self, now: u64) -> Option<&Notice> {
        if matches!(&self.notice, Some(Notice { expires_at: Some(at), .. }) if *at <= now) {
            self.notice = None;
        }
        self.notice.as_ref()
    }
}
