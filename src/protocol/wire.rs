use serde::{Deserialize, Serialize};

use crate::peer::PeerSnapshot;
use crate::update::Update;

/// Commands the decoder accepts; anything else is an unknown command.
const KNOWN_COMMANDS: &[&str] = &[
    "ping",
    "ack",
    "ping-req",
    "event",
    "event-req",
    "state-req",
    "state",
];

/// A piggybacked membership update as it travels on the wire.
///
/// The status is kept as a string here so one unrecognized status degrades
/// to a skipped update instead of a dropped datagram. `count` is transmitted
/// for observability but receivers reset it when buffering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireUpdate {
    pub id: u64,
    pub sequence: u64,
    pub status: String,
    #[serde(default)]
    pub count: u32,
}

impl From<&Update> for WireUpdate {
    fn from(update: &Update) -> Self {
        Self {
            id: update.id,
            sequence: update.sequence,
            status: update.status.as_str().to_string(),
            count: update.count,
        }
    }
}

/// The engine's wire protocol: a tagged JSON object per datagram.
///
/// `ping`, `ack`, and `ping-req` implement the SWIM probe cycle; `event`,
/// `event-req`, `state-req`, and `state` are test-observability commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Message {
    /// Direct health check. Replied to with `ack`.
    Ping {
        sender_id: u64,
        #[serde(default)]
        updates: Vec<WireUpdate>,
    },

    /// Acknowledgment of a `ping`, sent directly or relayed by the
    /// intermediary of an indirect probe.
    Ack {
        sender_id: u64,
        #[serde(default)]
        updates: Vec<WireUpdate>,
    },

    /// Ask the receiver to ping `target_id` on the sender's behalf and relay
    /// the ack back. The target's endpoint rides along so a receiver that
    /// has never met the target can still probe it.
    PingReq {
        sender_id: u64,
        #[serde(default)]
        updates: Vec<WireUpdate>,
        target_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_address: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_port: Option<u16>,
    },

    /// Report that the named event fired on the sender. Test support.
    Event {
        sender_id: u64,
        #[serde(default)]
        updates: Vec<WireUpdate>,
        event_name: String,
    },

    /// Arm a one-shot `event` reply for when the named event next fires on
    /// the receiver. Test support.
    EventReq {
        sender_id: u64,
        #[serde(default)]
        updates: Vec<WireUpdate>,
        event_name: String,
    },

    /// Request the receiver's peer-table snapshot. Test support.
    StateReq {
        sender_id: u64,
        #[serde(default)]
        updates: Vec<WireUpdate>,
    },

    /// Reply to `state-req`. Test support.
    State {
        sender_id: u64,
        #[serde(default)]
        updates: Vec<WireUpdate>,
        peers: Vec<PeerSnapshot>,
    },
}

impl Message {
    pub fn sender_id(&self) -> u64 {
        match self {
            Message::Ping { sender_id, .. }
            | Message::Ack { sender_id, .. }
            | Message::PingReq { sender_id, .. }
            | Message::Event { sender_id, .. }
            | Message::EventReq { sender_id, .. }
            | Message::StateReq { sender_id, .. }
            | Message::State { sender_id, .. } => *sender_id,
        }
    }

    pub fn updates(&self) -> &[WireUpdate] {
        match self {
            Message::Ping { updates, .. }
            | Message::Ack { updates, .. }
            | Message::PingReq { updates, .. }
            | Message::Event { updates, .. }
            | Message::EventReq { updates, .. }
            | Message::StateReq { updates, .. }
            | Message::State { updates, .. } => updates,
        }
    }
}

/// Why a datagram could not be decoded into a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Valid JSON object whose `command` is not part of the protocol.
    UnknownCommand(String),
    /// Not a valid protocol message; carries the raw datagram text.
    Parse(String),
}

/// Serializes a message into one JSON datagram.
pub fn encode(message: &Message) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(message)
}

/// Parses one datagram, classifying failures per [`CodecError`].
pub fn decode(buf: &[u8]) -> Result<Message, CodecError> {
    match serde_json::from_slice::<Message>(buf) {
        Ok(message) => Ok(message),
        Err(_) => {
            if let Ok(value) = serde_json::from_slice::<serde_json::Value>(buf)
                && let Some(command) = value.get("command").and_then(|c| c.as_str())
                && !KNOWN_COMMANDS.contains(&command)
            {
                return Err(CodecError::UnknownCommand(command.to_string()));
            }
            Err(CodecError::Parse(
                String::from_utf8_lossy(buf).into_owned(),
            ))
        }
    }
}
