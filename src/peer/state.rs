use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::types::{PeerEvent, PeerInfo, PeerSnapshot};
use crate::update::Status;

/// One remote node's record: identity, observed sequence, lifecycle status,
/// and the transient suspect deadline.
///
/// All transition functions are synchronous and return the events they
/// emitted; the engine actor applies them and owns every timer. Inputs come
/// from three places: gossiped updates (`apply_update`), direct observations
/// of the peer's own traffic (`observe`), and probe outcomes
/// (`suspect` / `expire_suspect`).
#[derive(Debug)]
pub struct Peer {
    info: PeerInfo,
    status: Status,
    sequence: u64,
    /// Sequence at which this peer was last declared down. Prevents
    /// re-firing the down transition for rumors older than one already
    /// applied.
    last_down_sequence: Option<u64>,
    /// Sequence of the last alive update applied to this record. A peer
    /// declared alive at S cannot be declared down by an update with a
    /// sequence <= S.
    last_alive_update: Option<u64>,
    /// Deadline for the suspect -> down transition, armed while suspect.
    suspect_deadline: Option<Instant>,
}

impl Peer {
    pub fn new(info: PeerInfo) -> Self {
        Self {
            info,
            status: Status::Alive,
            sequence: 0,
            last_down_sequence: None,
            last_alive_update: None,
            suspect_deadline: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.info.id
    }

    pub fn host(&self) -> &str {
        &self.info.host
    }

    pub fn port(&self) -> u16 {
        self.info.port
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_down_sequence(&self) -> Option<u64> {
        self.last_down_sequence
    }

    pub fn suspect_deadline(&self) -> Option<Instant> {
        self.suspect_deadline
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            id: self.info.id,
            host: self.info.host.clone(),
            port: self.info.port,
            status: self.status,
            sequence: self.sequence,
        }
    }

    /// Applies a gossiped `(sequence, status)` assertion about this peer.
    ///
    /// The sequence rule runs first: a higher incoming sequence is adopted
    /// and emits `PeerEvent::Sequence`. Staleness of the status itself is
    /// judged against the sequence held before adoption.
    pub fn apply_update(
        &mut self,
        sequence: u64,
        status: Status,
        now: Instant,
        suspect_timeout: Duration,
    ) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        let prev_sequence = self.sequence;
        if sequence > self.sequence {
            self.sequence = sequence;
            events.push(PeerEvent::Sequence(sequence));
        }

        match status {
            Status::Alive => {
                if sequence > prev_sequence {
                    self.last_alive_update = Some(sequence);
                    match self.status {
                        Status::Suspect => {
                            self.suspect_deadline = None;
                            self.transition(Status::Alive, &mut events);
                        }
                        Status::Down => {
                            // Revival demands a strictly higher sequence,
                            // which `sequence > prev_sequence` already is.
                            self.transition(Status::Alive, &mut events);
                        }
                        Status::Alive => {}
                    }
                } else if sequence == prev_sequence && self.status == Status::Alive {
                    // An equal-sequence alive neither clears suspicion nor
                    // revives a down peer, but it does count as an alive
                    // declaration at this sequence.
                    self.last_alive_update = Some(sequence);
                }
            }
            Status::Suspect => {
                if sequence >= prev_sequence && self.status == Status::Alive {
                    self.suspect_deadline = Some(now + suspect_timeout);
                    self.transition(Status::Suspect, &mut events);
                }
                // Suspect rumors neither refresh a suspect peer's timer nor
                // revive a down one.
            }
            Status::Down => {
                let newer_than_last_down =
                    self.last_down_sequence.is_none_or(|d| sequence > d);
                let newer_than_last_alive =
                    self.last_alive_update.is_none_or(|a| sequence > a);
                if newer_than_last_down && newer_than_last_alive {
                    self.last_down_sequence = Some(sequence);
                    if self.status != Status::Down {
                        self.suspect_deadline = None;
                        self.transition(Status::Down, &mut events);
                    }
                } else {
                    debug!(
                        peer = self.info.id,
                        sequence, "ignoring stale down rumor"
                    );
                }
            }
        }

        events
    }

    /// Direct observation: an ack, ping, or ping-req arrived from this peer
    /// itself. Clears suspicion; a down peer stays down until an alive
    /// update with a strictly higher sequence arrives.
    pub fn observe(&mut self) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        if self.status == Status::Suspect {
            self.suspect_deadline = None;
            self.transition(Status::Alive, &mut events);
        }
        events
    }

    /// Marks the peer suspect after a failed probe and arms the
    /// suspect-timeout. Idempotent: a no-op unless the peer is alive.
    pub fn suspect(&mut self, now: Instant, suspect_timeout: Duration) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        if self.status != Status::Alive {
            return events;
        }
        self.suspect_deadline = Some(now + suspect_timeout);
        self.transition(Status::Suspect, &mut events);
        events
    }

    /// Suspect-timeout expiry: the peer had its chance to refute and did
    /// not, so it is declared down at its current sequence.
    pub fn expire_suspect(&mut self) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        if self.status != Status::Suspect {
            return events;
        }
        self.suspect_deadline = None;
        self.last_down_sequence = Some(self.sequence);
        self.transition(Status::Down, &mut events);
        events
    }

    fn transition(&mut self, status: Status, events: &mut Vec<PeerEvent>) {
        self.status = status;
        events.push(PeerEvent::Became {
            status,
            sequence: self.sequence,
        });
    }
}
