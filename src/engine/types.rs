use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::EngineError;
use crate::peer::{PeerInfo, PeerSnapshot};

/// Observable engine signals, delivered on the broadcast channel returned
/// by `SwimEngine::subscribe`.
///
/// Signals carry facts, not control flow: the engine keeps running through
/// every one of them.
#[derive(Debug, Clone)]
pub enum Signal {
    /// A recoverable error occurred while handling a datagram or running a
    /// protocol period.
    Error(EngineError),
    /// A `ping-req` named a target the engine cannot resolve.
    PeerNotFound(u64),
    /// A datagram carried an unknown command and was dropped.
    UnrecognizedCommand(String),
    /// A piggybacked update carried an unknown status and was skipped.
    UnrecognizedStatus(String),
    /// A peer transitioned to alive.
    PeerAlive(u64),
    /// A peer transitioned to suspect.
    PeerSuspect(u64),
    /// A peer transitioned to down.
    PeerDown(u64),
    /// A peer's sequence number advanced.
    PeerSequence(u64, u64),
    /// A remote peer reported a named event (inbound `event` command).
    PeerEvent { from: u64, name: String },
}

impl Signal {
    /// Stable string name for this signal, matched by armed `event-req`
    /// watchers. Status signals are keyed per peer, mirroring the
    /// `"alive:42"` convention of the event bus this engine descends from.
    pub fn name(&self) -> String {
        match self {
            Signal::Error(_) => "error".to_string(),
            Signal::PeerNotFound(id) => format!("peer-not-found:{id}"),
            Signal::UnrecognizedCommand(_) => "unrecognized-command".to_string(),
            Signal::UnrecognizedStatus(_) => "unrecognized-status".to_string(),
            Signal::PeerAlive(id) => format!("alive:{id}"),
            Signal::PeerSuspect(id) => format!("suspect:{id}"),
            Signal::PeerDown(id) => format!("down:{id}"),
            Signal::PeerSequence(id, _) => format!("sequence:{id}"),
            Signal::PeerEvent { from, .. } => format!("event:{from}"),
        }
    }
}

/// Point-in-time cluster health counters, for operators and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    pub alive: usize,
    pub suspect: usize,
    pub down: usize,
    /// Updates currently waiting in the dissemination buffer.
    pub buffered_updates: usize,
}

/// Requests from the public handle to the engine actor. Replies travel on
/// oneshot channels so callers get synchronous results without sharing
/// engine state.
#[derive(Debug)]
pub(crate) enum ApiCommand {
    /// Begin the protocol-period loop.
    Start,
    /// Pause the protocol-period loop, cancelling the pending sleep.
    Stop,
    /// Stop the actor and close the socket.
    Shutdown { done: oneshot::Sender<()> },
    AddPeer {
        info: PeerInfo,
        reply: oneshot::Sender<Option<PeerSnapshot>>,
    },
    RandomPeer {
        reply: oneshot::Sender<Option<PeerSnapshot>>,
    },
    Members {
        reply: oneshot::Sender<Vec<PeerSnapshot>>,
    },
    Stats {
        reply: oneshot::Sender<ClusterStats>,
    },
    /// Send a `state-req` to a peer and resolve with its snapshot reply.
    RequestState {
        id: u64,
        deadline: Instant,
        reply: oneshot::Sender<Result<Vec<PeerSnapshot>, EngineError>>,
    },
    /// Send an `event-req` to a peer and resolve when it reports the event.
    EventReq {
        id: u64,
        name: String,
        deadline: Instant,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// A pending `event_req` API call: resolved when the named event arrives
/// from the peer, failed with `Timeout` at the deadline.
#[derive(Debug)]
pub(crate) struct EventWaiter {
    pub peer: u64,
    pub name: String,
    pub deadline: Instant,
    pub reply: oneshot::Sender<Result<(), EngineError>>,
}

/// A pending `request_state` API call.
#[derive(Debug)]
pub(crate) struct StateWaiter {
    pub peer: u64,
    pub deadline: Instant,
    pub reply: oneshot::Sender<Result<Vec<PeerSnapshot>, EngineError>>,
}

/// A one-shot watcher armed by an inbound `event-req`: when a local signal
/// with this name fires, an `event` datagram goes back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EventWatcher {
    pub name: String,
    pub requester: u64,
}
