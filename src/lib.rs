//! SWIM Membership Engine
//!
//! Failure detection and membership dissemination for a cluster of nodes,
//! after the SWIM protocol (Scalable Weakly-consistent Infection-style
//! Membership). Each node runs one [`SwimEngine`]; through periodic UDP
//! probing and gossiped updates every engine converges on an eventually
//! consistent view of which peers are reachable.
//!
//! ## Architecture Modules
//! The crate is composed of four loosely coupled subsystems:
//!
//! - **`update`**: The dissemination layer. A bounded buffer of membership
//!   assertions, ordered by how widely each has already spread and evicted
//!   once its infection count reaches a `ln(N)`-proportional limit.
//! - **`peer`**: The per-peer state machine. Tracks one remote node's
//!   status (`alive` / `suspect` / `down`) and sequence number, ordered by
//!   the peer's own monotonically increasing sequence.
//! - **`protocol`**: The wire codec. One JSON object per UDP datagram,
//!   carrying a command plus piggybacked updates.
//! - **`engine`**: The membership owner. A single actor task that runs the
//!   probe scheduler, dispatches inbound datagrams, and owns every timer.

pub mod engine;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod update;

pub use engine::{ClusterStats, Config, Signal, SwimEngine};
pub use error::EngineError;
pub use peer::{PeerInfo, PeerSnapshot};
pub use update::{Status, Update};
