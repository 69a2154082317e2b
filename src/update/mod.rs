//! Dissemination Updates Module
//!
//! The unit of gossip: a single assertion about some peer (`id`, `sequence`,
//! `status`) together with the infection counter that bounds how long it is
//! piggybacked on outgoing messages.
//!
//! ## Core Mechanisms
//! - **Infection counting**: every time an update rides on an outgoing
//!   datagram its `count` is incremented; once the count reaches a limit
//!   proportional to `ln(N + 1)` the update has, with high probability,
//!   reached every alive node and is evicted.
//! - **Least-disseminated-first**: outgoing messages carry the updates that
//!   have travelled the least, so fresh information spreads before stale.

pub mod buffer;
pub mod types;

pub use buffer::UpdateBuffer;
pub use types::{Status, Update};

#[cfg(test)]
mod tests;
