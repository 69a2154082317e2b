//! Engine Module
//!
//! The membership owner: glues the peer table, the dissemination buffer,
//! and the wire protocol together on one UDP socket.
//!
//! ## Core Mechanisms
//! - **Single mailbox**: all mutable state is owned by one actor task; the
//!   `SwimEngine` handle reaches it through a command channel with oneshot
//!   replies, so datagrams, timers, and API calls are handled one at a time.
//! - **Protocol periods**: a fixed-cadence scheduler probes one peer per
//!   period, walking a shuffled round-robin order so every peer is probed
//!   exactly once per epoch.
//! - **Probe escalation**: a missed ack escalates to an indirect probe
//!   through one random alive peer before the target is suspected,
//!   distinguishing real failures from one bad network path.

pub mod config;
pub mod probe;
pub mod scheduler;
pub mod service;
pub mod types;

pub use config::Config;
pub use service::SwimEngine;
pub use types::{ClusterStats, Signal};
