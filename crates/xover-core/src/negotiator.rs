//! Offer/answer/candidate exchange for one match.
//!
//! The negotiator performs no I/O of its own. The owning loop feeds it poll
//! results and transport events, and carries out the [`NegotiatorAction`]s it
//! returns (publishing to the rendezvous service, updating the UI, handing
//! channel messages to the game controller).

use crate::code::SessionCode;
use crate::signaling::{NegotiationRecord, Role, SignalMessage};
use crate::transport::{
    DescriptionKind, PeerConnectionState, PeerTransport, TransportError, TransportEvent,
    CHANNEL_LABEL,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("Negotiation already started")]
    AlreadyStarted,

    #[error("Not connected")]
    NotConnected,

    #[error("Session is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The owner tore the match down
    Teardown,
    /// Local setup (channel or offer creation) failed
    SetupFailed,
    /// The transport reported `failed`
    Failed,
    /// The transport reported `disconnected` or `closed`
    Disconnected,
    /// The data channel closed
    ChannelClosed,
    /// No connection within the negotiation timeout
    TimedOut,
}

/// Lifecycle: `Idle -> Negotiating -> Connected -> Closed`, or
/// `Negotiating -> Closed` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NegotiationState {
    Idle,
    Negotiating,
    Connected,
    Closed(CloseReason),
}

/// The only connection states the UI distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl NegotiationState {
    pub fn status(self) -> ConnectionStatus {
        match self {
            NegotiationState::Idle | NegotiationState::Negotiating => ConnectionStatus::Connecting,
            NegotiationState::Connected => ConnectionStatus::Connected,
            NegotiationState::Closed(_) => ConnectionStatus::Disconnected,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, NegotiationState::Closed(_))
    }
}

/// Progress on the remote description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    /// Waiting for the peer's offer (joiner) or answer (host)
    AwaitingRemote,
    /// Joiner installed the offer but has not produced its answer yet
    AnswerPending,
    /// Remote description installed and, for the joiner, answer published
    Complete,
}

/// Work for the owning loop
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiatorAction {
    /// Publish this message to the rendezvous record under our role
    Publish(SignalMessage),
    /// The externally visible connection status changed
    StatusChanged(ConnectionStatus),
    /// A message arrived on the data channel
    Deliver(String),
}

/// Drives one peer connection from first offer to connected channel.
///
/// One negotiation attempt per instance. The transport is released exactly once,
/// on the first close or when the negotiator is dropped.
pub struct SessionNegotiator<T: PeerTransport> {
    code: SessionCode,
    role: Role,
    transport: T,
    state: NegotiationState,
    handshake: Handshake,
    /// Serialized candidates already applied to the transport
    applied: HashSet<String>,
    /// Joiner candidates gathered before the answer went out
    held: Vec<serde_json::Value>,
    started_at: Option<u64>,
    timeout: Option<Duration>,
}

impl<T: PeerTransport> SessionNegotiator<T> {
    pub fn new(code: SessionCode, role: Role, transport: T) -> Self {
        Self {
            code,
            role,
            transport,
            state: NegotiationState::Idle,
            handshake: Handshake::AwaitingRemote,
            applied: HashSet::new(),
            held: Vec::new(),
            started_at: None,
            timeout: None,
        }
    }

    /// Give up if not connected this long after `start`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    /// The rendezvous record still needs polling
    pub fn is_polling(&self) -> bool {
        self.state == NegotiationState::Negotiating
    }

    /// Number of distinct remote candidates applied so far
    pub fn applied_candidates(&self) -> usize {
        self.applied.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Begin negotiating. The host opens the channel and publishes its offer;
    /// the joiner just starts waiting for one.
    pub fn start(&mut self, now: u64) -> Result<Vec<NegotiatorAction>, NegotiationError> {
        if self.state != NegotiationState::Idle {
            return Err(NegotiationError::AlreadyStarted);
        }

        info!(code = %self.code, role = %self.role, "Starting negotiation");
        self.state = NegotiationState::Negotiating;
        self.started_at = Some(now);

        let mut actions = vec![NegotiatorAction::StatusChanged(ConnectionStatus::Connecting)];

        if self.role == Role::Host {
            let offer = self
                .transport
                .open_channel(CHANNEL_LABEL)
                .and_then(|()| self.transport.create_offer());

            match offer {
                Ok(sdp) => actions.push(NegotiatorAction::Publish(SignalMessage::offer(sdp, now))),
                Err(e) => {
                    warn!(code = %self.code, "Failed to create offer: {}", e);
                    self.close(CloseReason::SetupFailed);
                    return Err(e.into());
                }
            }
        }

        Ok(actions)
    }

    /// Fail the attempt once the timeout has elapsed without a connection.
    pub fn check_timeout(&mut self, now: u64) -> Vec<NegotiatorAction> {
        let (Some(timeout), Some(started_at)) = (self.timeout, self.started_at) else {
            return Vec::new();
        };
        if !self.is_polling() || now.saturating_sub(started_at) < timeout.as_millis() as u64 {
            return Vec::new();
        }

        warn!(code = %self.code, role = %self.role, "Negotiation timed out");
        self.close_with_status(CloseReason::TimedOut)
    }

    /// Process the latest copy of the rendezvous record.
    ///
    /// Anything that fails here is logged and retried on the next poll.
    pub fn on_record(&mut self, record: &NegotiationRecord, now: u64) -> Vec<NegotiatorAction> {
        let mut actions = Vec::new();
        if !self.is_polling() {
            return actions;
        }

        match self.role {
            Role::Host => self.consume_answer(record),
            Role::Joiner => self.consume_offer(record, now, &mut actions),
        }

        if self.handshake != Handshake::AwaitingRemote {
            self.apply_remote_candidates(record);
        }

        actions
    }

    fn consume_answer(&mut self, record: &NegotiationRecord) {
        if self.handshake != Handshake::AwaitingRemote {
            return;
        }
        let Some(sdp) = record.answer.as_ref().and_then(SignalMessage::sdp) else {
            return;
        };

        match self.transport.set_remote_description(DescriptionKind::Answer, sdp) {
            Ok(()) => {
                debug!(code = %self.code, "Answer applied");
                self.handshake = Handshake::Complete;
            }
            Err(e) => warn!(code = %self.code, "Failed to apply answer: {}", e),
        }
    }

    fn consume_offer(
        &mut self,
        record: &NegotiationRecord,
        now: u64,
        actions: &mut Vec<NegotiatorAction>,
    ) {
        if self.handshake == Handshake::AwaitingRemote {
            let Some(sdp) = record.offer.as_ref().and_then(SignalMessage::sdp) else {
                return;
            };
            match self.transport.set_remote_description(DescriptionKind::Offer, sdp) {
                Ok(()) => {
                    debug!(code = %self.code, "Offer applied");
                    self.handshake = Handshake::AnswerPending;
                }
                Err(e) => {
                    warn!(code = %self.code, "Failed to apply offer: {}", e);
                    return;
                }
            }
        }

        if self.handshake == Handshake::AnswerPending {
            match self.transport.create_answer() {
                Ok(sdp) => {
                    self.handshake = Handshake::Complete;
                    actions.push(NegotiatorAction::Publish(SignalMessage::answer(sdp, now)));
                    // The answer must reach the record before our candidates do
                    actions.extend(
                        self.held
                            .drain(..)
                            .map(|c| NegotiatorAction::Publish(SignalMessage::ice(c, now))),
                    );
                }
                Err(e) => warn!(code = %self.code, "Failed to create answer: {}", e),
            }
        }
    }

    fn apply_remote_candidates(&mut self, record: &NegotiationRecord) {
        for message in record.candidates_from(self.role.peer()) {
            let (Some(key), Some(candidate)) = (message.candidate_key(), message.candidate()) else {
                continue;
            };
            if self.applied.contains(&key) {
                continue;
            }
            match self.transport.add_ice_candidate(candidate) {
                Ok(()) => {
                    debug!(code = %self.code, candidate = %key, "Remote candidate applied");
                    self.applied.insert(key);
                }
                Err(e) => debug!(code = %self.code, "Candidate not applied yet: {}", e),
            }
        }
    }

    /// Handle one transport event.
    pub fn on_transport_event(&mut self, event: TransportEvent, now: u64) -> Vec<NegotiatorAction> {
        if self.state.is_closed() {
            debug!(code = %self.code, ?event, "Ignoring event after close");
            return Vec::new();
        }

        match event {
            TransportEvent::LocalCandidate(candidate) => {
                if self.role == Role::Joiner && self.handshake != Handshake::Complete {
                    self.held.push(candidate);
                    Vec::new()
                } else {
                    vec![NegotiatorAction::Publish(SignalMessage::ice(candidate, now))]
                }
            }
            TransportEvent::ConnectionState(PeerConnectionState::Connected) => {
                if self.state == NegotiationState::Connected {
                    return Vec::new();
                }
                info!(code = %self.code, role = %self.role, "Peer connected");
                self.state = NegotiationState::Connected;
                vec![NegotiatorAction::StatusChanged(ConnectionStatus::Connected)]
            }
            TransportEvent::ConnectionState(PeerConnectionState::Failed) => {
                self.close_with_status(CloseReason::Failed)
            }
            TransportEvent::ConnectionState(
                PeerConnectionState::Disconnected | PeerConnectionState::Closed,
            ) => self.close_with_status(CloseReason::Disconnected),
            TransportEvent::ConnectionState(state) => {
                debug!(code = %self.code, ?state, "Connection state");
                Vec::new()
            }
            TransportEvent::ChannelOpen => {
                debug!(code = %self.code, "Channel open");
                Vec::new()
            }
            TransportEvent::ChannelClosed => self.close_with_status(CloseReason::ChannelClosed),
            TransportEvent::Message(text) => vec![NegotiatorAction::Deliver(text)],
        }
    }

    /// Send text to the peer over the connected channel
    pub fn send(&mut self, text: &str) -> Result<(), NegotiationError> {
        match self.state {
            NegotiationState::Connected => Ok(self.transport.send(text)?),
            NegotiationState::Closed(_) => Err(NegotiationError::Closed),
            _ => Err(NegotiationError::NotConnected),
        }
    }

    /// Explicit teardown by the owner
    pub fn teardown(&mut self) -> Vec<NegotiatorAction> {
        self.close_with_status(CloseReason::Teardown)
    }

    fn close_with_status(&mut self, reason: CloseReason) -> Vec<NegotiatorAction> {
        if self.close(reason) {
            vec![NegotiatorAction::StatusChanged(ConnectionStatus::Disconnected)]
        } else {
            Vec::new()
        }
    }

    /// Stop polling, close the channel, then the transport. Returns false if
    /// already closed.
    fn close(&mut self, reason: CloseReason) -> bool {
        if self.state.is_closed() {
            return false;
        }
        info!(code = %self.code, role = %self.role, ?reason, "Closing session");
        self.state = NegotiationState::Closed(reason);
        self.held.clear();
        self.transport.close_channel();
        self.transport.close();
        true
    }
}

impl<T: PeerTransport> Drop for SessionNegotiator<T> {
    fn drop(&mut self) {
        self.close(CloseReason::Teardown);
    }
}
