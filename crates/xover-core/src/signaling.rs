//! Negotiation messages and the rendezvous record they are stored in.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a negotiation record lives after creation
pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// How often expired records are swept regardless of access
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The two asymmetric positions in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates the code, the channel and the offer
    Host,
    /// Answers an existing offer
    Joiner,
}

impl Role {
    pub fn peer(self) -> Self {
        match self {
            Role::Host => Role::Joiner,
            Role::Joiner => Role::Host,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Joiner => f.write_str("joiner"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
    Ice,
}

/// Body of a signal; exactly one field is set depending on the kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<serde_json::Value>,
}

/// One offer, answer or ICE candidate as published to the rendezvous service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub payload: SignalPayload,
    pub timestamp: u64,
}

impl SignalMessage {
    pub fn offer(sdp: impl Into<String>, timestamp: u64) -> Self {
        Self::description(SignalKind::Offer, sdp.into(), timestamp)
    }

    pub fn answer(sdp: impl Into<String>, timestamp: u64) -> Self {
        Self::description(SignalKind::Answer, sdp.into(), timestamp)
    }

    pub fn ice(candidate: serde_json::Value, timestamp: u64) -> Self {
        Self {
            kind: SignalKind::Ice,
            payload: SignalPayload {
                sdp: None,
                candidate: Some(candidate),
            },
            timestamp,
        }
    }

    fn description(kind: SignalKind, sdp: String, timestamp: u64) -> Self {
        Self {
            kind,
            payload: SignalPayload {
                sdp: Some(sdp),
                candidate: None,
            },
            timestamp,
        }
    }

    pub fn sdp(&self) -> Option<&str> {
        self.payload.sdp.as_deref()
    }

    pub fn candidate(&self) -> Option<&serde_json::Value> {
        self.payload.candidate.as_ref()
    }

    /// Whether the payload carries the field its kind requires
    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            SignalKind::Offer | SignalKind::Answer => self.payload.sdp.is_some(),
            SignalKind::Ice => self.payload.candidate.is_some(),
        }
    }

    /// Identity used for candidate de-duplication: the serialized candidate.
    pub fn candidate_key(&self) -> Option<String> {
        self.candidate().map(|c| c.to_string())
    }
}

/// Everything published for one session code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SignalMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SignalMessage>,
    #[serde(default)]
    pub host_ice: Vec<SignalMessage>,
    #[serde(default)]
    pub joiner_ice: Vec<SignalMessage>,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl NegotiationRecord {
    pub fn new(created_at: u64) -> Self {
        Self {
            offer: None,
            answer: None,
            host_ice: Vec::new(),
            joiner_ice: Vec::new(),
            created_at,
        }
    }

    /// Candidates published by `role`
    pub fn candidates_from(&self, role: Role) -> &[SignalMessage] {
        match role {
            Role::Host => &self.host_ice,
            Role::Joiner => &self.joiner_ice,
        }
    }

    /// Age exceeds `ttl` at `now` (both in milliseconds)
    pub fn is_expired(&self, now: u64, ttl: Duration) -> bool {
        now.saturating_sub(self.created_at) > ttl.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_wire_format() {
        let offer = SignalMessage::offer("v=0", 42);
        assert_eq!(
            serde_json::to_value(&offer).unwrap(),
            json!({"type": "offer", "payload": {"sdp": "v=0"}, "timestamp": 42})
        );

        let ice = SignalMessage::ice(json!({"candidate": "candidate:1"}), 43);
        assert_eq!(
            serde_json::to_value(&ice).unwrap(),
            json!({
                "type": "ice",
                "payload": {"candidate": {"candidate": "candidate:1"}},
                "timestamp": 43
            })
        );
    }

    #[test]
    fn test_well_formed() {
        let bad: SignalMessage =
            serde_json::from_value(json!({"type": "answer", "payload": {}, "timestamp": 1}))
                .unwrap();
        assert!(!bad.is_well_formed());
        assert!(SignalMessage::answer("v=0", 1).is_well_formed());
    }

    #[test]
    fn test_record_wire_format() {
        let mut record = NegotiationRecord::new(1000);
        record.host_ice.push(SignalMessage::ice(json!("c1"), 1001));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["createdAt"], json!(1000));
        assert_eq!(value["joinerIce"], json!([]));
        assert!(value.get("offer").is_none());
        assert_eq!(record.candidates_from(Role::Host).len(), 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let record = NegotiationRecord::new(0);
        let ttl_ms = SESSION_TTL.as_millis() as u64;
        assert!(!record.is_expired(ttl_ms - 1, SESSION_TTL));
        assert!(!record.is_expired(ttl_ms, SESSION_TTL));
        assert!(record.is_expired(ttl_ms + 1, SESSION_TTL));
    }
}
