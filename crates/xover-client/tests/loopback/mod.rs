//! In-memory peer transport pair.
//!
//! Mimics the parts of a real peer connection the negotiator relies on: a
//! description must be installed before candidates are accepted, candidates
//! are discovered when the local description is created, and the link only
//! reports `connected` once both sides have installed the other's description
//! and at least one remote candidate.

use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use xover_core::{
    DescriptionKind, PeerConnectionState, PeerTransport, TransportError, TransportEvent,
};

const CANDIDATES_PER_SIDE: usize = 2;

#[derive(Default)]
struct Side {
    local_sdp: Option<String>,
    remote_installed: bool,
    candidates_added: usize,
    closed: bool,
}

struct Link {
    sides: [Side; 2],
    events: [mpsc::UnboundedSender<TransportEvent>; 2],
    connected: bool,
}

impl Link {
    fn notify(&self, side: usize, event: TransportEvent) {
        let _ = self.events[side].send(event);
    }

    fn maybe_connect(&mut self) {
        let ready = self
            .sides
            .iter()
            .all(|s| s.remote_installed && s.candidates_added > 0 && !s.closed);
        if ready && !self.connected {
            self.connected = true;
            for side in 0..2 {
                self.notify(side, TransportEvent::ConnectionState(PeerConnectionState::Connected));
                self.notify(side, TransportEvent::ChannelOpen);
            }
        }
    }
}

pub struct LoopbackTransport {
    side: usize,
    link: Arc<Mutex<Link>>,
}

/// Two connected transports and their event streams.
pub fn pair() -> (
    (LoopbackTransport, mpsc::UnboundedReceiver<TransportEvent>),
    (LoopbackTransport, mpsc::UnboundedReceiver<TransportEvent>),
) {
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    let link = Arc::new(Mutex::new(Link {
        sides: Default::default(),
        events: [tx_a, tx_b],
        connected: false,
    }));

    (
        (
            LoopbackTransport {
                side: 0,
                link: Arc::clone(&link),
            },
            rx_a,
        ),
        (LoopbackTransport { side: 1, link }, rx_b),
    )
}

impl LoopbackTransport {
    fn peer(&self) -> usize {
        1 - self.side
    }

    fn describe(&mut self, kind: &str) -> String {
        let mut link = self.link.lock().unwrap();
        let sdp = format!("{}-{}", kind, self.side);
        link.sides[self.side].local_sdp = Some(sdp.clone());
        for i in 0..CANDIDATES_PER_SIDE {
            let candidate = json!({
                "candidate": format!("cand-{}-{}", self.side, i),
                "sdpMLineIndex": 0
            });
            link.notify(self.side, TransportEvent::LocalCandidate(candidate));
        }
        sdp
    }
}

impl PeerTransport for LoopbackTransport {
    fn open_channel(&mut self, _label: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn create_offer(&mut self) -> Result<String, TransportError> {
        Ok(self.describe("offer"))
    }

    fn create_answer(&mut self) -> Result<String, TransportError> {
        if !self.link.lock().unwrap().sides[self.side].remote_installed {
            return Err(TransportError::NoRemoteDescription);
        }
        Ok(self.describe("answer"))
    }

    fn set_remote_description(
        &mut self,
        _kind: DescriptionKind,
        sdp: &str,
    ) -> Result<(), TransportError> {
        let mut link = self.link.lock().unwrap();
        if link.sides[self.peer()].local_sdp.as_deref() != Some(sdp) {
            return Err(TransportError::Rejected(format!("unknown description {}", sdp)));
        }
        link.sides[self.side].remote_installed = true;
        Ok(())
    }

    fn add_ice_candidate(&mut self, _candidate: &serde_json::Value) -> Result<(), TransportError> {
        let mut link = self.link.lock().unwrap();
        if !link.sides[self.side].remote_installed {
            return Err(TransportError::NoRemoteDescription);
        }
        link.sides[self.side].candidates_added += 1;
        link.maybe_connect();
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let link = self.link.lock().unwrap();
        if !link.connected || link.sides[self.peer()].closed {
            return Err(TransportError::ChannelNotOpen);
        }
        link.notify(self.peer(), TransportEvent::Message(text.to_string()));
        Ok(())
    }

    fn close_channel(&mut self) {}

    fn close(&mut self) {
        let mut link = self.link.lock().unwrap();
        if link.sides[self.side].closed {
            return;
        }
        link.sides[self.side].closed = true;
        if link.connected {
            link.notify(
                self.peer(),
                TransportEvent::ConnectionState(PeerConnectionState::Disconnected),
            );
        }
    }
}
