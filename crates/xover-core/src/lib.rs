//! XOver - nested tic-tac-toe played locally or over a direct peer link
//!
//! This crate provides the platform-agnostic core of XOver:
//! - The rules engine for the two-level board, with forced-board routing
//! - Session codes and the negotiation messages exchanged through rendezvous
//! - A sans-IO negotiator that drives a peer connection to a connected channel
//! - The game controller that reconciles local and remote moves
//!
//! # Architecture
//!
//! Nothing here performs I/O. The rendezvous server (`xover-server`) stores
//! negotiation records; the native client (`xover-client`) runs the event loop
//! that feeds poll results and transport events into the negotiator. With the
//! `wasm` feature the local game is exposed to JavaScript.
//!
//! # Modules
//!
//! - [`board`]: Marks, sub-boards and line detection
//! - [`game`]: Game state and the move/undo rules
//! - [`actions`]: Messages sent over the peer channel
//! - [`code`]: Session codes
//! - [`signaling`]: Offer/answer/candidate messages and the rendezvous record
//! - [`transport`]: The peer-connection interface
//! - [`negotiator`]: The negotiation state machine
//! - [`controller`]: Local/remote move reconciliation

pub mod actions;
pub mod board;
pub mod code;
pub mod controller;
pub mod game;
pub mod negotiator;
pub mod signaling;
pub mod transport;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::PeerMessage;
pub use board::{available_sub_boards, Cell, MacroBoard, Mark, SubBoard, SubBoardResult};
pub use code::{CodeError, SessionCode};
pub use controller::{GameController, GameMode, Notice, NoticeKind, Rejection};
pub use game::{macro_outcome, GameState, MoveError, MoveRecord, Outcome};
pub use negotiator::{
    CloseReason, ConnectionStatus, NegotiationError, NegotiationState, NegotiatorAction,
    SessionNegotiator,
};
pub use signaling::{
    NegotiationRecord, Role, SignalKind, SignalMessage, SESSION_TTL, SWEEP_INTERVAL,
};
pub use transport::{
    DescriptionKind, PeerConnectionState, PeerTransport, TransportError, TransportEvent,
};
