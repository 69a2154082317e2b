use thiserror::Error;

/// Errors surfaced by the engine, either returned from API calls or carried
/// on the signal channel.
///
/// None of these are fatal to the engine itself: datagram-level failures are
/// signalled and the protocol loops keep running. A supervisor that watches
/// the signal channel may decide to tear the engine down on repeated errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The UDP socket could not be bound during `init`.
    #[error("failed to bind UDP socket: {0}")]
    Bind(String),

    /// A datagram send failed. Signalled, never returned.
    #[error("failed to send datagram: {0}")]
    Send(String),

    /// An inbound datagram was not a valid protocol message.
    #[error("invalid message: {0:?}")]
    Parse(String),

    /// An API request named a peer id that is not in the peer table.
    #[error("unknown peer {0}")]
    UnknownPeer(u64),

    /// An awaited remote reply (event-req / state-req) did not arrive in time.
    #[error("timed out waiting for reply")]
    Timeout,

    /// A datagram carried a `command` value the dispatcher does not know.
    #[error("unrecognized command {0:?}")]
    UnknownCommand(String),

    /// A piggybacked update carried a status string the engine does not know.
    #[error("unrecognized status {0:?}")]
    UnknownStatus(String),

    /// An API call was made before `init` or after `teardown`.
    #[error("engine is not running")]
    NotRunning,
}
