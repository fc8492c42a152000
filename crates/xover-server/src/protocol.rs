//! WebSocket protocol messages for the XOver rendezvous service.
//!
//! Strictly request/response: every client message is answered by exactly one
//! server message, in order.

use serde::{Deserialize, Serialize};
use xover_core::{NegotiationRecord, Role, SessionCode, SignalMessage};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Register an empty record for a code, replacing any existing one
    Create { code: SessionCode },

    /// Publish an offer, answer or ICE candidate
    Signal {
        code: SessionCode,
        message: SignalMessage,
        /// Publisher's role for candidates; inferred when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
    },

    /// Read the full record
    Fetch { code: SessionCode },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Record created
    Created { code: SessionCode },

    /// Signal stored, or `accepted: false` when the record is gone
    Published { code: SessionCode, accepted: bool },

    /// Current record contents
    Record {
        code: SessionCode,
        record: NegotiationRecord,
    },

    /// No live record for the code
    NotFound { code: SessionCode },

    /// Request could not be processed
    Error { message: String },

    /// Pong response
    Pong,
}
