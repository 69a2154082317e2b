use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Lifecycle state of a peer as seen by the local failure detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The peer is healthy and responsive.
    Alive,
    /// The peer failed a probe and is suspected to be down.
    /// It returns to `Alive` if it refutes the suspicion in time,
    /// otherwise it transitions to `Down`.
    Suspect,
    /// The peer is confirmed failed. Only an alive assertion with a strictly
    /// higher sequence number can bring it back.
    Down,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Alive => "alive",
            Status::Suspect => "suspect",
            Status::Down => "down",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(Status::Alive),
            "suspect" => Ok(Status::Suspect),
            "down" => Ok(Status::Down),
            other => Err(EngineError::UnknownStatus(other.to_string())),
        }
    }
}

/// A single dissemination item: an assertion that peer `id` was in `status`
/// at `sequence`, plus the number of outgoing messages that have carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// The peer the assertion is about.
    pub id: u64,
    /// The asserted sequence number; higher sequence supersedes lower.
    pub sequence: u64,
    /// The asserted status.
    pub status: Status,
    /// How many outgoing messages have carried this update so far.
    /// Transmitted on the wire but receiver-ignored (reset to 0 on buffering).
    pub count: u32,
}

impl Update {
    pub fn new(id: u64, sequence: u64, status: Status) -> Self {
        Self {
            id,
            sequence,
            status,
            count: 0,
        }
    }
}
