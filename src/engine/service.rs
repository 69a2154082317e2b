use std::collections::HashMap;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::Config;
use super::probe::{ProbeExpiry, ProbeState, ProbeVerdict, RelayProbe};
use super::scheduler::ProbeSchedule;
use super::types::{ApiCommand, ClusterStats, EventWaiter, EventWatcher, Signal, StateWaiter};
use crate::error::EngineError;
use crate::peer::{Peer, PeerEvent, PeerInfo, PeerSnapshot};
use crate::protocol::{CodecError, Message, WireUpdate, decode, encode};
use crate::update::{Status, Update, UpdateBuffer};

const MAX_DATAGRAM: usize = 64 * 1024;
const SIGNAL_CAPACITY: usize = 256;

/// The membership engine: one instance per node.
///
/// `SwimEngine` is the public handle; all protocol state lives in the
/// [`EngineActor`] task spawned by `init` and is reached exclusively through
/// its command mailbox, so inbound datagrams, timer expiries, and API calls
/// are serialized onto one event at a time.
pub struct SwimEngine {
    config: Config,
    signal_tx: broadcast::Sender<Signal>,
    cmd_tx: Option<mpsc::UnboundedSender<ApiCommand>>,
    actor: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl SwimEngine {
    pub fn new(config: Config) -> Self {
        let (signal_tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            config,
            signal_tx,
            cmd_tx: None,
            actor: None,
            local_addr: None,
        }
    }

    /// Binds the UDP socket, populates the peer table, and spawns the engine
    /// actor. A no-op when already initialized. On a bind failure the engine
    /// is left un-initialized and can be re-initialized later.
    pub async fn init(&mut self, peers: &[PeerInfo]) -> Result<(), EngineError> {
        if self.cmd_tx.is_some() {
            return Ok(());
        }

        let socket = UdpSocket::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| EngineError::Bind(e.to_string()))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| EngineError::Bind(e.to_string()))?;

        let mut actor = EngineActor::new(
            self.config.clone(),
            Arc::new(socket),
            self.signal_tx.clone(),
        );
        for info in peers {
            actor.insert_peer(info.clone());
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.actor = Some(tokio::spawn(run(actor, cmd_rx)));
        self.cmd_tx = Some(cmd_tx);
        self.local_addr = Some(local_addr);
        info!("engine {} listening on {}", self.config.id, local_addr);
        Ok(())
    }

    /// Stops the actor, closes the socket, and releases every pending timer.
    pub async fn teardown(&mut self) {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let (done_tx, done_rx) = oneshot::channel();
            if cmd_tx.send(ApiCommand::Shutdown { done: done_tx }).is_ok() {
                let _ = done_rx.await;
            }
        }
        if let Some(actor) = self.actor.take() {
            let _ = actor.await;
        }
        self.local_addr = None;
    }

    /// Begins the protocol-period loop: one probe per period until `stop`.
    pub fn start(&self) -> Result<(), EngineError> {
        self.send_command(ApiCommand::Start)
    }

    /// Pauses the protocol-period loop, cancelling the pending sleep.
    /// Inbound datagrams are still served.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.send_command(ApiCommand::Stop)
    }

    /// Registers a peer. Returns `None` when the id is the engine's own or
    /// already present.
    pub async fn add_peer(&self, info: PeerInfo) -> Result<Option<PeerSnapshot>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ApiCommand::AddPeer { info, reply: tx })?;
        rx.await.map_err(|_| EngineError::NotRunning)
    }

    /// Uniform pick from the peer table.
    pub async fn random_peer(&self) -> Result<Option<PeerSnapshot>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ApiCommand::RandomPeer { reply: tx })?;
        rx.await.map_err(|_| EngineError::NotRunning)
    }

    /// Snapshot of every known peer.
    pub async fn members(&self) -> Result<Vec<PeerSnapshot>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ApiCommand::Members { reply: tx })?;
        rx.await.map_err(|_| EngineError::NotRunning)
    }

    /// Snapshot of the peers currently considered alive.
    pub async fn alive_members(&self) -> Result<Vec<PeerSnapshot>, EngineError> {
        let members = self.members().await?;
        Ok(members
            .into_iter()
            .filter(|m| m.status == Status::Alive)
            .collect())
    }

    /// Cluster health counters: peers by status plus the dissemination
    /// backlog.
    pub async fn stats(&self) -> Result<ClusterStats, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ApiCommand::Stats { reply: tx })?;
        rx.await.map_err(|_| EngineError::NotRunning)
    }

    /// Test support: asks `id` for its peer-table snapshot and awaits the
    /// `state` reply. Fails with `UnknownPeer` for absent ids and `Timeout`
    /// when no reply arrives before the deadline.
    pub async fn request_state(
        &self,
        id: u64,
        timeout: Duration,
    ) -> Result<Vec<PeerSnapshot>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ApiCommand::RequestState {
            id,
            deadline: Instant::now() + timeout,
            reply: tx,
        })?;
        rx.await.map_err(|_| EngineError::NotRunning)?
    }

    /// Test support: arms an `event-req` on peer `id` and resolves when that
    /// peer reports the named event. Fails with `UnknownPeer` for absent ids
    /// and `Timeout` when the event does not fire before the deadline.
    pub async fn event_req(
        &self,
        id: u64,
        name: &str,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(ApiCommand::EventReq {
            id,
            name: name.to_string(),
            deadline: Instant::now() + timeout,
            reply: tx,
        })?;
        rx.await.map_err(|_| EngineError::NotRunning)?
    }

    /// Subscribes to the engine's signal stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signal_tx.subscribe()
    }

    /// The bound socket address, available after a successful `init`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn id(&self) -> u64 {
        self.config.id
    }

    fn send_command(&self, command: ApiCommand) -> Result<(), EngineError> {
        self.cmd_tx
            .as_ref()
            .ok_or(EngineError::NotRunning)?
            .send(command)
            .map_err(|_| EngineError::NotRunning)
    }
}

/// Owns every piece of mutable engine state: peer table, probe order,
/// dissemination buffer, local sequence, in-flight probe, relay probes, and
/// the test-support waiters. Driven solely by [`run`].
pub(crate) struct EngineActor {
    config: Config,
    socket: Arc<UdpSocket>,
    peers: HashMap<u64, Peer>,
    schedule: ProbeSchedule,
    buffer: UpdateBuffer,
    /// The local node's own monotonically increasing sequence.
    sequence: u64,
    /// Whether the protocol-period loop is running.
    probing: bool,
    probe: ProbeState,
    relays: Vec<RelayProbe>,
    event_watchers: Vec<EventWatcher>,
    event_waiters: Vec<EventWaiter>,
    state_waiters: Vec<StateWaiter>,
    /// Event datagrams owed to remote requesters, sent after the current
    /// handler finishes so signal emission never re-enters the engine.
    due_events: Vec<(u64, String)>,
    signal_tx: broadcast::Sender<Signal>,
    rng: StdRng,
}

impl EngineActor {
    pub(crate) fn new(
        config: Config,
        socket: Arc<UdpSocket>,
        signal_tx: broadcast::Sender<Signal>,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let buffer = UpdateBuffer::new(config.max_piggyback_updates, config.dissemination_factor);
        Self {
            config,
            socket,
            peers: HashMap::new(),
            schedule: ProbeSchedule::new(),
            buffer,
            sequence: 0,
            probing: false,
            probe: ProbeState::Idle,
            relays: Vec::new(),
            event_watchers: Vec::new(),
            event_waiters: Vec::new(),
            state_waiters: Vec::new(),
            due_events: Vec::new(),
            signal_tx,
            rng,
        }
    }

    pub(crate) fn insert_peer(&mut self, info: PeerInfo) -> Option<PeerSnapshot> {
        if info.id == self.config.id || self.peers.contains_key(&info.id) {
            return None;
        }
        info!("registering peer {} at {}:{}", info.id, info.host, info.port);
        let peer = Peer::new(info);
        let snapshot = peer.snapshot();
        self.schedule.insert(peer.id(), &mut self.rng);
        self.peers.insert(peer.id(), peer);
        Some(snapshot)
    }

    async fn handle_command(&mut self, command: ApiCommand) -> ControlFlow<()> {
        match command {
            ApiCommand::Start => {
                if !self.probing {
                    info!("protocol period loop started");
                    self.probing = true;
                    self.run_protocol_period().await;
                }
            }
            ApiCommand::Stop => {
                if self.probing {
                    info!("protocol period loop stopped");
                }
                self.probing = false;
            }
            ApiCommand::Shutdown { done } => {
                let _ = done.send(());
                return ControlFlow::Break(());
            }
            ApiCommand::AddPeer { info, reply } => {
                let _ = reply.send(self.insert_peer(info));
            }
            ApiCommand::RandomPeer { reply } => {
                let snapshot = self
                    .schedule
                    .random(&mut self.rng)
                    .and_then(|id| self.peers.get(&id))
                    .map(Peer::snapshot);
                let _ = reply.send(snapshot);
            }
            ApiCommand::Members { reply } => {
                let _ = reply.send(self.snapshots());
            }
            ApiCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            ApiCommand::RequestState { id, deadline, reply } => {
                if let Some((host, port)) = self.endpoint(id) {
                    let message = Message::StateReq {
                        sender_id: self.config.id,
                        updates: self.piggyback(),
                    };
                    self.send(&message, &host, port).await;
                    self.state_waiters.push(StateWaiter { peer: id, deadline, reply });
                } else {
                    let _ = reply.send(Err(EngineError::UnknownPeer(id)));
                }
            }
            ApiCommand::EventReq { id, name, deadline, reply } => {
                if let Some((host, port)) = self.endpoint(id) {
                    let message = Message::EventReq {
                        sender_id: self.config.id,
                        updates: self.piggyback(),
                        event_name: name.clone(),
                    };
                    self.send(&message, &host, port).await;
                    self.event_waiters.push(EventWaiter { peer: id, name, deadline, reply });
                } else {
                    let _ = reply.send(Err(EngineError::UnknownPeer(id)));
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_datagram(&mut self, buf: &[u8], src: SocketAddr) {
        let message = match decode(buf) {
            Ok(message) => message,
            Err(CodecError::UnknownCommand(command)) => {
                warn!("dropping datagram from {} with unknown command {:?}", src, command);
                self.emit(Signal::UnrecognizedCommand(command));
                return;
            }
            Err(CodecError::Parse(raw)) => {
                warn!("dropping unparseable datagram from {}", src);
                self.emit(Signal::Error(EngineError::Parse(raw)));
                return;
            }
        };

        // One-sided knowledge is expected during bootstrap: a sender we have
        // never met is registered from the datagram's source endpoint.
        let sender_id = message.sender_id();
        if sender_id != self.config.id && !self.peers.contains_key(&sender_id) {
            debug!("discovered peer {} from {}", sender_id, src);
            self.insert_peer(PeerInfo::new(sender_id, src.ip().to_string(), src.port()));
        }

        // Updates are applied before the command handler so a ping carrying
        // a rumor about the local node is answered with the refutation
        // already buffered.
        for update in message.updates().to_vec() {
            self.apply_wire_update(&update);
        }

        match message {
            Message::Ping { .. } => {
                self.observe(sender_id);
                let ack = Message::Ack {
                    sender_id: self.config.id,
                    updates: self.piggyback(),
                };
                self.send(&ack, &src.ip().to_string(), src.port()).await;
            }
            Message::Ack { .. } => {
                self.observe(sender_id);
                self.handle_ack(sender_id).await;
            }
            Message::PingReq { target_id, target_address, target_port, .. } => {
                self.observe(sender_id);
                self.handle_ping_req(sender_id, target_id, target_address, target_port)
                    .await;
            }
            Message::Event { event_name, .. } => {
                let mut kept = Vec::new();
                for waiter in self.event_waiters.drain(..) {
                    if waiter.peer == sender_id && waiter.name == event_name {
                        let _ = waiter.reply.send(Ok(()));
                    } else {
                        kept.push(waiter);
                    }
                }
                self.event_waiters = kept;
                self.emit(Signal::PeerEvent { from: sender_id, name: event_name });
            }
            Message::EventReq { event_name, .. } => {
                debug!("peer {} armed a watcher for {:?}", sender_id, event_name);
                self.event_watchers.push(EventWatcher {
                    name: event_name,
                    requester: sender_id,
                });
            }
            Message::StateReq { .. } => {
                let reply = Message::State {
                    sender_id: self.config.id,
                    updates: self.piggyback(),
                    peers: self.snapshots(),
                };
                self.send(&reply, &src.ip().to_string(), src.port()).await;
            }
            Message::State { peers, .. } => {
                let mut kept = Vec::new();
                for waiter in self.state_waiters.drain(..) {
                    if waiter.peer == sender_id {
                        let _ = waiter.reply.send(Ok(peers.clone()));
                    } else {
                        kept.push(waiter);
                    }
                }
                self.state_waiters = kept;
            }
        }
    }

    /// An ack from `sender` may settle the scheduler's probe and any relay
    /// probes armed for that peer.
    async fn handle_ack(&mut self, sender: u64) {
        if let ProbeVerdict::Settled { target } = self.probe.settle(sender)
            && target != sender
        {
            // Relayed ack: the intermediary heard from the target.
            self.observe(target);
        }

        let mut due = Vec::new();
        self.relays.retain(|relay| {
            if relay.target == sender {
                due.push(relay.clone());
                false
            } else {
                true
            }
        });
        for relay in due {
            let Some((host, port)) = self.endpoint(relay.origin) else {
                self.emit(Signal::PeerNotFound(relay.origin));
                continue;
            };
            debug!("relaying ack for {} back to {}", relay.target, relay.origin);
            let ack = Message::Ack {
                sender_id: self.config.id,
                updates: self.piggyback(),
            };
            self.send(&ack, &host, port).await;
        }
    }

    /// Probes the named target on behalf of `origin`, relaying the ack if it
    /// arrives within the probe timeout. No indirect escalation here.
    async fn handle_ping_req(
        &mut self,
        origin: u64,
        target_id: u64,
        target_address: Option<String>,
        target_port: Option<u16>,
    ) {
        if target_id == self.config.id {
            // We are the target; answer for ourselves.
            if let Some((host, port)) = self.endpoint(origin) {
                let ack = Message::Ack {
                    sender_id: self.config.id,
                    updates: self.piggyback(),
                };
                self.send(&ack, &host, port).await;
            }
            return;
        }

        if !self.peers.contains_key(&target_id) {
            match (target_address, target_port) {
                (Some(host), Some(port)) => {
                    self.insert_peer(PeerInfo::new(target_id, host, port));
                }
                _ => {
                    warn!("ping-req for unknown target {} without an endpoint", target_id);
                    self.emit(Signal::PeerNotFound(target_id));
                    return;
                }
            }
        }
        let Some((host, port)) = self.endpoint(target_id) else {
            self.emit(Signal::PeerNotFound(target_id));
            return;
        };

        let ping = Message::Ping {
            sender_id: self.config.id,
            updates: self.piggyback(),
        };
        self.send(&ping, &host, port).await;
        self.relays.push(RelayProbe {
            target: target_id,
            origin,
            deadline: Instant::now() + self.config.probe_timeout(),
        });
    }

    /// One protocol period: probe the next peer in the shuffled round-robin
    /// order. Skipped while a previous probe is still in flight.
    async fn run_protocol_period(&mut self) {
        if !self.probe.is_idle() {
            debug!("previous probe still in flight, skipping this period");
            return;
        }
        let Some(target) = self.schedule.next(&mut self.rng) else {
            return;
        };
        let Some((host, port)) = self.endpoint(target) else {
            return;
        };
        debug!("probing peer {}", target);
        let ping = Message::Ping {
            sender_id: self.config.id,
            updates: self.piggyback(),
        };
        self.send(&ping, &host, port).await;
        self.probe
            .await_ack(target, Instant::now() + self.config.probe_timeout());
    }

    /// Services every deadline that has passed: probe escalation, expired
    /// relay probes, timed-out waiters, and suspect timers.
    async fn handle_deadlines(&mut self) {
        let now = Instant::now();

        match self.probe.expire(now) {
            ProbeExpiry::Nothing => {}
            ProbeExpiry::Escalate { target } => self.escalate_probe(target, now).await,
            ProbeExpiry::GiveUp { target } => {
                debug!("indirect probe of {} timed out", target);
                self.suspect_peer(target, now);
            }
        }

        self.relays.retain(|relay| relay.deadline > now);

        let mut kept = Vec::new();
        for waiter in self.event_waiters.drain(..) {
            if waiter.deadline <= now {
                let _ = waiter.reply.send(Err(EngineError::Timeout));
            } else {
                kept.push(waiter);
            }
        }
        self.event_waiters = kept;

        let mut kept = Vec::new();
        for waiter in self.state_waiters.drain(..) {
            if waiter.deadline <= now {
                let _ = waiter.reply.send(Err(EngineError::Timeout));
            } else {
                kept.push(waiter);
            }
        }
        self.state_waiters = kept;

        let expired: Vec<u64> = self
            .peers
            .values()
            .filter(|p| p.suspect_deadline().is_some_and(|d| d <= now))
            .map(Peer::id)
            .collect();
        for id in expired {
            info!("peer {} failed to refute suspicion, declaring it down", id);
            let events = match self.peers.get_mut(&id) {
                Some(peer) => peer.expire_suspect(),
                None => continue,
            };
            self.process_peer_events(id, events);
        }
    }

    /// The direct probe of `target` timed out: hand the probe to one random
    /// alive peer, or suspect the target right away when nobody can help.
    async fn escalate_probe(&mut self, target: u64, now: Instant) {
        let candidates: Vec<u64> = self
            .schedule
            .ids()
            .iter()
            .copied()
            .filter(|id| {
                *id != target
                    && self
                        .peers
                        .get(id)
                        .is_some_and(|p| p.status() == Status::Alive)
            })
            .collect();

        let target_endpoint = self.endpoint(target);
        match (candidates.choose(&mut self.rng).copied(), target_endpoint) {
            (Some(via), Some((target_host, target_port))) => {
                debug!("no ack from {}, asking {} to probe it for us", target, via);
                let Some((host, port)) = self.endpoint(via) else {
                    self.suspect_peer(target, now);
                    return;
                };
                let message = Message::PingReq {
                    sender_id: self.config.id,
                    updates: self.piggyback(),
                    target_id: target,
                    target_address: Some(target_host),
                    target_port: Some(target_port),
                };
                self.send(&message, &host, port).await;
                self.probe
                    .await_indirect(target, via, now + self.config.probe_timeout());
            }
            _ => {
                debug!("no ack from {} and no indirect candidate", target);
                self.suspect_peer(target, now);
            }
        }
    }

    fn suspect_peer(&mut self, id: u64, now: Instant) {
        let events = match self.peers.get_mut(&id) {
            Some(peer) => peer.suspect(now, self.config.probe_timeout()),
            None => return,
        };
        self.process_peer_events(id, events);
    }

    fn observe(&mut self, id: u64) {
        let events = match self.peers.get_mut(&id) {
            Some(peer) => peer.observe(),
            None => return,
        };
        self.process_peer_events(id, events);
    }

    /// Applies one piggybacked update: rumors about the local node go
    /// through self-refutation, everything else through the named peer's
    /// state machine.
    fn apply_wire_update(&mut self, update: &WireUpdate) {
        let status = match update.status.parse::<Status>() {
            Ok(status) => status,
            Err(_) => {
                warn!("skipping update with unrecognized status {:?}", update.status);
                self.emit(Signal::UnrecognizedStatus(update.status.clone()));
                return;
            }
        };

        if update.id == self.config.id {
            self.refute_if_needed(update.sequence, status);
            return;
        }

        let events = match self.peers.get_mut(&update.id) {
            Some(peer) => peer.apply_update(
                update.sequence,
                status,
                Instant::now(),
                self.config.probe_timeout(),
            ),
            None => {
                // Wire updates carry no endpoint, so there is nothing to
                // register; the rumor is dropped.
                debug!("ignoring update about unknown peer {}", update.id);
                return;
            }
        };
        self.process_peer_events(update.id, events);
    }

    /// Someone is spreading a non-alive rumor about the local node at (or
    /// past) its current sequence: outrun it with a fresher alive assertion.
    fn refute_if_needed(&mut self, sequence: u64, status: Status) {
        match status {
            Status::Alive => {
                if sequence > self.sequence {
                    self.sequence = sequence;
                }
            }
            Status::Suspect | Status::Down => {
                if sequence >= self.sequence {
                    self.sequence = sequence + 1;
                    info!(
                        "refuting {} rumor about the local node, sequence now {}",
                        status, self.sequence
                    );
                    self.buffer.add(Update::new(
                        self.config.id,
                        self.sequence,
                        Status::Alive,
                    ));
                }
            }
        }
    }

    fn process_peer_events(&mut self, id: u64, events: Vec<PeerEvent>) {
        for event in events {
            match event {
                PeerEvent::Sequence(sequence) => {
                    self.emit(Signal::PeerSequence(id, sequence));
                }
                PeerEvent::Became { status, sequence } => {
                    self.buffer.add(Update::new(id, sequence, status));
                    let signal = match status {
                        Status::Alive => Signal::PeerAlive(id),
                        Status::Suspect => Signal::PeerSuspect(id),
                        Status::Down => Signal::PeerDown(id),
                    };
                    info!("peer {} is now {} (sequence {})", id, status, sequence);
                    self.emit(signal);
                }
            }
        }
    }

    /// Publishes a signal and fires any armed one-shot watchers for it.
    /// Watcher replies are deferred to `flush_events` so emission never
    /// re-enters the engine.
    fn emit(&mut self, signal: Signal) {
        let name = signal.name();
        let mut fired = Vec::new();
        self.event_watchers.retain(|watcher| {
            if watcher.name == name {
                fired.push(watcher.requester);
                false
            } else {
                true
            }
        });
        for requester in fired {
            self.due_events.push((requester, name.clone()));
        }
        self.publish(signal);
    }

    /// Broadcast without watcher matching; used by the send path so a send
    /// failure cannot recursively owe more event datagrams.
    fn publish(&self, signal: Signal) {
        let _ = self.signal_tx.send(signal);
    }

    /// Sends the `event` datagrams owed to remote watchers.
    async fn flush_events(&mut self) {
        while let Some((requester, name)) = self.due_events.pop() {
            let Some((host, port)) = self.endpoint(requester) else {
                self.publish(Signal::PeerNotFound(requester));
                continue;
            };
            let message = Message::Event {
                sender_id: self.config.id,
                updates: self.piggyback(),
                event_name: name,
            };
            self.send(&message, &host, port).await;
        }
    }

    async fn send(&mut self, message: &Message, host: &str, port: u16) {
        match encode(message) {
            Ok(bytes) => {
                if let Err(e) = self.socket.send_to(&bytes, (host, port)).await {
                    warn!("failed to send to {}:{}: {}", host, port, e);
                    self.publish(Signal::Error(EngineError::Send(e.to_string())));
                }
            }
            Err(e) => {
                self.publish(Signal::Error(EngineError::Send(e.to_string())));
            }
        }
    }

    /// Freshest updates to piggyback on an outgoing message.
    fn piggyback(&mut self) -> Vec<WireUpdate> {
        self.buffer
            .take(self.peers.len())
            .iter()
            .map(WireUpdate::from)
            .collect()
    }

    fn stats(&self) -> ClusterStats {
        let mut stats = ClusterStats {
            buffered_updates: self.buffer.len(),
            ..ClusterStats::default()
        };
        for peer in self.peers.values() {
            match peer.status() {
                Status::Alive => stats.alive += 1,
                Status::Suspect => stats.suspect += 1,
                Status::Down => stats.down += 1,
            }
        }
        stats
    }

    fn snapshots(&self) -> Vec<PeerSnapshot> {
        self.schedule
            .ids()
            .iter()
            .filter_map(|id| self.peers.get(id))
            .map(Peer::snapshot)
            .collect()
    }

    fn endpoint(&self, id: u64) -> Option<(String, u16)> {
        self.peers
            .get(&id)
            .map(|p| (p.host().to_string(), p.port()))
    }

    /// Earliest pending deadline across the probe, relay probes, waiters,
    /// and per-peer suspect timers. One logical timer serves them all.
    fn next_deadline(&self) -> Option<Instant> {
        let relays = self.relays.iter().map(|r| r.deadline);
        let events = self.event_waiters.iter().map(|w| w.deadline);
        let states = self.state_waiters.iter().map(|w| w.deadline);
        let suspects = self.peers.values().filter_map(Peer::suspect_deadline);
        self.probe
            .deadline()
            .into_iter()
            .chain(relays)
            .chain(events)
            .chain(states)
            .chain(suspects)
            .min()
    }
}

/// The engine's event loop: one event at a time, chosen among an inbound
/// datagram, an API command, the earliest deadline, and the protocol-period
/// tick.
pub(crate) async fn run(mut actor: EngineActor, mut cmd_rx: mpsc::UnboundedReceiver<ApiCommand>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut period = time::interval(actor.config.protocol_period());
    period.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let socket = Arc::clone(&actor.socket);

    loop {
        let deadline = actor.next_deadline();
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, src)) => actor.handle_datagram(&buf[..len], src).await,
                Err(e) => {
                    warn!("receive failed: {}", e);
                    actor.publish(Signal::Error(EngineError::Send(e.to_string())));
                    time::sleep(Duration::from_millis(100)).await;
                }
            },
            command = cmd_rx.recv() => match command {
                Some(command) => {
                    if actor.handle_command(command).await.is_break() {
                        break;
                    }
                }
                None => break,
            },
            _ = sleep_until_opt(deadline) => actor.handle_deadlines().await,
            _ = period.tick() => {
                if actor.probing {
                    actor.run_protocol_period().await;
                }
            }
        }
        actor.flush_events().await;
    }
    debug!("engine actor stopped");
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
