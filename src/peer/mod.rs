//! Peer State Module
//!
//! Tracks one remote node: identity, the highest sequence number observed
//! for it, and its lifecycle status (`alive` -> `suspect` -> `down`).
//!
//! ## Core Mechanisms
//! - **Sequence ordering**: gossip about a peer is ordered by the peer's own
//!   monotonically increasing sequence number; higher supersedes lower, so
//!   reordered and duplicated datagrams converge to the same view.
//! - **Suspicion before death**: a failed probe only marks a peer `suspect`;
//!   the peer has one suspect-timeout to refute before it is declared
//!   `down`, which avoids false positives on transient path failures.
//! - **Typed transition events**: every transition function returns the
//!   events it produced (`PeerEvent`); the engine is the sole observer and
//!   turns status changes into dissemination-buffer entries.

pub mod state;
pub mod types;

pub use state::Peer;
pub use types::{PeerEvent, PeerInfo, PeerSnapshot};
