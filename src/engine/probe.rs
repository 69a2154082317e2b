use tokio::time::Instant;

/// The scheduler's probe, modelled as an explicit state machine rather than
/// a suspended task: the engine actor owns at most one of these and drives
/// it with acks and deadline expiries.
///
/// `Idle` -> (send ping) -> `AwaitingAck` -> (timeout, send ping-req)
/// -> `AwaitingIndirect` -> (timeout) -> suspect target, back to `Idle`.
/// Any matching ack short-circuits back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    /// A ping went out to `target`; waiting for its ack.
    AwaitingAck { target: u64, deadline: Instant },
    /// The direct probe timed out and `via` was asked to ping `target` on
    /// our behalf; waiting for an ack from either of them.
    AwaitingIndirect {
        target: u64,
        via: u64,
        deadline: Instant,
    },
}

/// What an incoming ack meant to the in-flight probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// The ack belongs to something else (a relay, a stray reply).
    Unrelated,
    /// The probe settled; `target` is reachable and should be marked alive.
    Settled { target: u64 },
}

/// What a passed deadline demands of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeExpiry {
    /// No deadline had passed.
    Nothing,
    /// The direct wait ran out: escalate to an indirect probe of `target`.
    Escalate { target: u64 },
    /// The indirect wait ran out too: give up and suspect `target`.
    GiveUp { target: u64 },
}

impl ProbeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ProbeState::Idle)
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            ProbeState::Idle => None,
            ProbeState::AwaitingAck { deadline, .. }
            | ProbeState::AwaitingIndirect { deadline, .. } => Some(*deadline),
        }
    }

    /// The peer currently under probe, if any.
    pub fn target(&self) -> Option<u64> {
        match self {
            ProbeState::Idle => None,
            ProbeState::AwaitingAck { target, .. }
            | ProbeState::AwaitingIndirect { target, .. } => Some(*target),
        }
    }

    /// Arms the direct-probe wait for `target`.
    pub fn await_ack(&mut self, target: u64, deadline: Instant) {
        *self = ProbeState::AwaitingAck { target, deadline };
    }

    /// Escalates the probe: `via` has been asked to reach `target` for us.
    pub fn await_indirect(&mut self, target: u64, via: u64, deadline: Instant) {
        *self = ProbeState::AwaitingIndirect { target, via, deadline };
    }

    /// Feeds an ack from `sender` into the probe. Settles when the target
    /// answers directly or the indirect relay forwards the target's ack.
    pub fn settle(&mut self, sender: u64) -> ProbeVerdict {
        let settled = match self {
            ProbeState::Idle => None,
            ProbeState::AwaitingAck { target, .. } => {
                (*target == sender).then_some(*target)
            }
            ProbeState::AwaitingIndirect { target, via, .. } => {
                (*target == sender || *via == sender).then_some(*target)
            }
        };
        match settled {
            Some(target) => {
                *self = ProbeState::Idle;
                ProbeVerdict::Settled { target }
            }
            None => ProbeVerdict::Unrelated,
        }
    }

    /// Consumes a passed deadline, returning the follow-up the engine owes.
    /// The state always returns to `Idle`; on escalation the engine re-arms
    /// it with `await_indirect` once the ping-req is on the wire.
    pub fn expire(&mut self, now: Instant) -> ProbeExpiry {
        let Some(deadline) = self.deadline() else {
            return ProbeExpiry::Nothing;
        };
        if deadline > now {
            return ProbeExpiry::Nothing;
        }
        match std::mem::replace(self, ProbeState::Idle) {
            ProbeState::Idle => ProbeExpiry::Nothing,
            ProbeState::AwaitingAck { target, .. } => ProbeExpiry::Escalate { target },
            ProbeState::AwaitingIndirect { target, .. } => ProbeExpiry::GiveUp { target },
        }
    }
}

/// An inbound `ping-req` we are relaying: we pinged `target` on behalf of
/// `origin` and will forward the ack if it arrives before the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayProbe {
    pub target: u64,
    pub origin: u64,
    pub deadline: Instant,
}
