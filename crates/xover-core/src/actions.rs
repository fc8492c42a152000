//! Messages exchanged directly between peers once connected.

use crate::board::Mark;
use crate::game::MoveRecord;
use serde::{Deserialize, Serialize};

/// Everything that travels over the peer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PeerMessage {
    /// A move the sender has already applied locally
    Move {
        #[serde(rename = "subIndex")]
        sub_index: u8,
        #[serde(rename = "cellIndex")]
        cell_index: u8,
        mark: Mark,
        timestamp: u64,
    },
}

impl PeerMessage {
    /// Wrap a played move for sending
    pub fn from_record(record: MoveRecord, timestamp: u64) -> Self {
        PeerMessage::Move {
            sub_index: record.sub_index as u8,
            cell_index: record.cell_index as u8,
            mark: record.mark,
            timestamp,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
