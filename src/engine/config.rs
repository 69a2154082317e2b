use std::time::Duration;

/// Engine configuration: local identity, bind endpoint, and protocol
/// timers. Timers are fixed for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// This node's cluster-unique integer identifier.
    pub id: u64,
    /// Host to bind the UDP socket to.
    pub host: String,
    /// Port to bind the UDP socket to (0 picks an ephemeral port).
    pub port: u16,
    /// Probe timeout in milliseconds; one value serves the direct-probe,
    /// indirect-probe, and suspect timers.
    pub probe_timeout_ms: u64,
    /// Protocol-period cadence in milliseconds. Defaults to twice the probe
    /// timeout so an indirect probe completes within the period.
    pub protocol_period_ms: u64,
    /// Cap on piggybacked updates per outgoing datagram.
    pub max_piggyback_updates: usize,
    /// Multiplier `k` in the dissemination limit `round(ln(N + 1) * k)`.
    pub dissemination_factor: f64,
    /// Seed for the engine's RNG; `None` seeds from entropy. Fixing it makes
    /// shuffles and indirect-peer picks reproducible in tests.
    pub rng_seed: Option<u64>,
}

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_PIGGYBACK_UPDATES: usize = 6;
pub const DEFAULT_DISSEMINATION_FACTOR: f64 = 3.0;

impl Config {
    pub fn new(id: u64, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            protocol_period_ms: 2 * DEFAULT_PROBE_TIMEOUT_MS,
            max_piggyback_updates: DEFAULT_MAX_PIGGYBACK_UPDATES,
            dissemination_factor: DEFAULT_DISSEMINATION_FACTOR,
            rng_seed: None,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn protocol_period(&self) -> Duration {
        Duration::from_millis(self.protocol_period_ms)
    }
}
