//! The peer-connection facility the negotiator drives.
//!
//! Candidate gathering and channel establishment are provided by the platform
//! (a browser `RTCPeerConnection`, a native WebRTC stack, or a test double).
//! Everything it reports back arrives as a [`TransportEvent`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label of the single data channel a match uses
pub const CHANNEL_LABEL: &str = "game";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport is closed")]
    Closed,

    #[error("Channel is not open")]
    ChannelNotOpen,

    #[error("Remote description not set")]
    NoRemoteDescription,

    #[error("Transport rejected the operation: {0}")]
    Rejected(String),
}

/// Which side of the handshake a session description belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    Offer,
    Answer,
}

/// Connection state as reported by the transport itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Everything the transport reports asynchronously
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A local ICE candidate was gathered
    LocalCandidate(serde_json::Value),
    /// The peer connection changed state
    ConnectionState(PeerConnectionState),
    /// The data channel opened
    ChannelOpen,
    /// The data channel closed
    ChannelClosed,
    /// A text message arrived on the data channel
    Message(String),
}

/// Operations the negotiator needs from a peer connection.
pub trait PeerTransport {
    /// Create the outbound data channel (host side)
    fn open_channel(&mut self, label: &str) -> Result<(), TransportError>;

    /// Create an offer and install it as the local description; returns its SDP
    fn create_offer(&mut self) -> Result<String, TransportError>;

    /// Create an answer to the installed remote offer and install it locally
    fn create_answer(&mut self) -> Result<String, TransportError>;

    fn set_remote_description(
        &mut self,
        kind: DescriptionKind,
        sdp: &str,
    ) -> Result<(), TransportError>;

    fn add_ice_candidate(&mut self, candidate: &serde_json::Value) -> Result<(), TransportError>;

    /// Send text over the data channel
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    fn close_channel(&mut self);

    /// Release the peer connection
    fn close(&mut self);
}
