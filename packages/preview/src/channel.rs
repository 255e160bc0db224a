//! # Preview Channel
//!
//! Session object carrying config updates from the editor to one live
//! preview.
//!
//! ## Lifecycle
//!
//! ```text
//!            open()                 preview_connected / pong
//! Closed ───────────▶ Open ─────────────────────────────────▶ PreviewConnected
//!   ▲                  ▲                                           │
//!   │                  └──────────── peer window gone ─────────────┤
//!   └───────────────────────────── close() ────────────────────────┘
//! ```
//!
//! ## Update ordering
//!
//! Each `config_update` is diffed against the last config that actually
//! reached the preview. A queued update that is superseded before its timer
//! fires is never diffed against, and a send that finds no peer leaves the
//! base where it was.
//!
//! ## Locking
//!
//! Channel state lives behind one mutex. Transport calls and state listeners
//! are queued while it is held and run once it is released, so a transport
//! may deliver a reply synchronously from inside `send`.

use crate::config::ChannelConfig;
use crate::errors::ChannelError;
use crate::lock;
use crate::message::{ChannelMessage, MessageKind, SourceTag};
use crate::scheduler::{Scheduler, TimerId};
use crate::transport::{Envelope, InboundHandler, ListenerId, PeerRef, Transport};
use stagesync_diff::{compute_changed_paths, detect_structural_change};
use stagesync_document::{Path, Value};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Closed,
    Open,
    PreviewConnected,
}

pub type StateListener = Arc<dyn Fn(ChannelState) + Send + Sync>;

/// Counters for observability and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub updates_sent: u64,
    pub sends_skipped: u64,
    pub messages_dropped: u64,
}

#[derive(Default)]
struct Inner {
    state: ChannelState,
    listener: Option<ListenerId>,
    peer: Option<PeerRef>,

    debounce: Option<TimerId>,
    debounce_seq: u64,
    ping: Option<TimerId>,
    ping_seq: u64,
    ping_attempts: u32,

    /// Latest config the editor wants shown
    current: Option<Value>,
    /// Last config that reached the preview
    last_broadcast: Option<Value>,

    /// Bumped on every open and close; stale transport results are ignored
    epoch: u64,

    stats: ChannelStats,
    notices: Vec<ChannelState>,
    effects: Vec<Effect>,
}

/// Transport call deferred until the channel lock is released
enum Effect {
    Subscribe { epoch: u64 },
    Unsubscribe(ListenerId),
    Send(Outbound),
}

struct Outbound {
    peer: PeerRef,
    message: ChannelMessage,
    /// Becomes the broadcast base once the send succeeds
    snapshot: Option<Value>,
    epoch: u64,
}

impl Inner {
    fn transition(&mut self, state: ChannelState) {
        if self.state != state {
            self.state = state;
            self.notices.push(state);
        }
    }
}

struct Shared {
    config: ChannelConfig,
    origin: String,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    inner: Mutex<Inner>,
    on_state: Mutex<Option<StateListener>>,
}

/// Editor-side end of the preview connection
#[derive(Clone)]
pub struct PreviewChannel {
    shared: Arc<Shared>,
}

impl PreviewChannel {
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, ChannelError> {
        let origin = config.preview_origin()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                origin,
                transport,
                scheduler,
                inner: Mutex::new(Inner::default()),
                on_state: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Origin every message is sent to and accepted from
    pub fn preview_origin(&self) -> &str {
        &self.shared.origin
    }

    pub fn state(&self) -> ChannelState {
        lock(&self.shared.inner).state
    }

    pub fn peer(&self) -> Option<PeerRef> {
        lock(&self.shared.inner).peer
    }

    pub fn last_broadcast(&self) -> Option<Value> {
        lock(&self.shared.inner).last_broadcast.clone()
    }

    pub fn stats(&self) -> ChannelStats {
        lock(&self.shared.inner).stats
    }

    pub fn has_pending_update(&self) -> bool {
        lock(&self.shared.inner).debounce.is_some()
    }

    /// Observe state transitions; called outside the channel lock
    pub fn on_state_change(&self, listener: impl Fn(ChannelState) + Send + Sync + 'static) {
        *lock(&self.shared.on_state) = Some(Arc::new(listener));
    }

    /// Start listening for the preview; no-op when already open
    pub fn open(&self) {
        self.shared.update(|shared, inner| {
            if inner.state != ChannelState::Closed {
                return;
            }
            inner.epoch += 1;
            inner.effects.push(Effect::Subscribe { epoch: inner.epoch });
            inner.transition(ChannelState::Open);
            info!(
                experiment = %shared.config.experiment_id,
                origin = %shared.origin,
                "Preview channel open"
            );
        });
    }

    /// Tell the preview we're leaving and go quiet
    pub fn close(&self) {
        self.shared.update(|shared, inner| {
            if inner.state == ChannelState::Closed {
                return;
            }
            if inner.peer.is_some() {
                shared.send(inner, MessageKind::EditorClosed, None);
            }
            if let Some(id) = inner.debounce.take() {
                shared.scheduler.cancel(id);
            }
            if let Some(id) = inner.ping.take() {
                shared.scheduler.cancel(id);
            }
            if let Some(id) = inner.listener.take() {
                inner.effects.push(Effect::Unsubscribe(id));
            }
            inner.epoch += 1;
            inner.peer = None;
            inner.current = None;
            inner.last_broadcast = None;
            inner.transition(ChannelState::Closed);
            info!(experiment = %shared.config.experiment_id, "Preview channel closed");
        });
    }

    /// Record a freshly opened preview context and probe it after the ping
    /// delay
    pub fn attach_peer(&self, peer: PeerRef) {
        self.shared.update(|shared, inner| {
            if inner.state == ChannelState::Closed {
                debug!(%peer, "Ignoring peer on closed channel");
                return;
            }
            if inner.peer != Some(peer) && inner.state == ChannelState::PreviewConnected {
                inner.transition(ChannelState::Open);
            }
            inner.peer = Some(peer);
            inner.ping_attempts = 0;
            shared.arm_ping(inner, shared.config.ping_delay());
        });
    }

    /// Debounce `config` for delivery
    pub fn queue_config_update(&self, config: Value) {
        self.shared.update(|shared, inner| {
            if inner.state == ChannelState::Closed {
                debug!("Dropping config update on closed channel");
                return;
            }
            inner.current = Some(config);
            shared.arm_debounce(inner);
        });
    }

    /// Send the latest queued config now, superseding any pending timer.
    ///
    /// Returns whether a message was delivered.
    pub fn flush_now(&self) -> bool {
        let (_, delivered) = self.shared.apply(|shared, inner| {
            if inner.state == ChannelState::Closed {
                return;
            }
            if let Some(id) = inner.debounce.take() {
                shared.scheduler.cancel(id);
            }
            shared.flush(inner);
        });
        delivered > 0
    }

    /// Feed one inbound envelope, for transports that deliver by hand
    pub fn handle_envelope(&self, envelope: Envelope) {
        self.shared.receive(envelope);
    }
}

impl Shared {
    fn update<R>(self: &Arc<Self>, f: impl FnOnce(&Arc<Self>, &mut Inner) -> R) -> R {
        self.apply(f).0
    }

    /// Run `f` under the channel lock, then perform the transport calls it
    /// queued and notify state listeners.
    ///
    /// Also returns how many config updates reached the preview.
    fn apply<R>(self: &Arc<Self>, f: impl FnOnce(&Arc<Self>, &mut Inner) -> R) -> (R, usize) {
        let (result, effects) = {
            let mut inner = lock(&self.inner);
            let result = f(self, &mut inner);
            (result, std::mem::take(&mut inner.effects))
        };
        let delivered = effects
            .into_iter()
            .map(|effect| self.perform(effect))
            .filter(|delivered| *delivered)
            .count();
        self.notify();
        (result, delivered)
    }

    fn notify(&self) {
        let notices = std::mem::take(&mut lock(&self.inner).notices);
        if notices.is_empty() {
            return;
        }
        let listener = lock(&self.on_state).clone();
        if let Some(listener) = listener {
            for state in notices {
                listener(state);
            }
        }
    }

    /// Returns true when a config update was delivered
    fn perform(self: &Arc<Self>, effect: Effect) -> bool {
        match effect {
            Effect::Subscribe { epoch } => {
                let weak: Weak<Shared> = Arc::downgrade(self);
                let handler: InboundHandler = Arc::new(move |envelope| {
                    if let Some(shared) = weak.upgrade() {
                        shared.receive(envelope);
                    }
                });
                let id = self.transport.subscribe(handler);
                let mut inner = lock(&self.inner);
                if inner.epoch == epoch {
                    inner.listener = Some(id);
                } else {
                    // Closed again before the subscription landed
                    drop(inner);
                    self.transport.unsubscribe(id);
                }
                false
            }
            Effect::Unsubscribe(id) => {
                self.transport.unsubscribe(id);
                false
            }
            Effect::Send(outbound) => self.deliver(outbound),
        }
    }

    fn deliver(&self, outbound: Outbound) -> bool {
        let name = outbound.message.kind.name();
        let peer = outbound.peer;

        if !self.transport.is_open(peer) {
            debug!(message = name, %peer, "Preview gone, skipping send");
            let mut inner = lock(&self.inner);
            inner.stats.sends_skipped += 1;
            if inner.peer == Some(peer) {
                inner.peer = None;
                if inner.state == ChannelState::PreviewConnected {
                    inner.transition(ChannelState::Open);
                }
            }
            return false;
        }

        let sent = self.transport.send(peer, &self.origin, &outbound.message);
        let mut inner = lock(&self.inner);
        match sent {
            Ok(()) => {
                trace!(message = name, %peer, "Sent");
                match outbound.snapshot {
                    Some(snapshot) if inner.epoch == outbound.epoch => {
                        inner.last_broadcast = Some(snapshot);
                        inner.stats.updates_sent += 1;
                        true
                    }
                    _ => false,
                }
            }
            Err(e) => {
                debug!(message = name, %peer, error = %e, "Send failed");
                inner.stats.sends_skipped += 1;
                false
            }
        }
    }

    fn arm_debounce(self: &Arc<Self>, inner: &mut Inner) {
        if let Some(id) = inner.debounce.take() {
            self.scheduler.cancel(id);
        }
        inner.debounce_seq += 1;
        let seq = inner.debounce_seq;
        let weak = Arc::downgrade(self);
        let id = self.scheduler.schedule_once(
            self.config.debounce(),
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.update(|shared, inner| shared.on_debounce(inner, seq));
                }
            }),
        );
        inner.debounce = Some(id);
    }

    fn on_debounce(&self, inner: &mut Inner, seq: u64) {
        if inner.state == ChannelState::Closed || inner.debounce_seq != seq || inner.debounce.is_none() {
            return;
        }
        inner.debounce = None;
        self.flush(inner);
    }

    fn arm_ping(self: &Arc<Self>, inner: &mut Inner, delay: std::time::Duration) {
        if let Some(id) = inner.ping.take() {
            self.scheduler.cancel(id);
        }
        inner.ping_seq += 1;
        let seq = inner.ping_seq;
        let weak = Arc::downgrade(self);
        let id = self.scheduler.schedule_once(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.update(|shared, inner| shared.on_ping(inner, seq));
                }
            }),
        );
        inner.ping = Some(id);
    }

    fn on_ping(self: &Arc<Self>, inner: &mut Inner, seq: u64) {
        if inner.state == ChannelState::Closed || inner.ping_seq != seq || inner.ping.is_none() {
            return;
        }
        inner.ping = None;
        if inner.state == ChannelState::PreviewConnected {
            return;
        }
        self.send(inner, MessageKind::Ping, None);
        inner.ping_attempts += 1;
        if inner.ping_attempts < self.config.max_ping_attempts && inner.peer.is_some() {
            let backoff = self.config.ping_delay() * 2u32.saturating_pow(inner.ping_attempts);
            debug!(attempt = inner.ping_attempts, ?backoff, "Preview silent, probing again");
            self.arm_ping(inner, backoff);
        }
    }

    /// Diff the current config against the last broadcast one and queue it
    fn flush(&self, inner: &mut Inner) {
        let Some(config) = inner.current.clone() else {
            return;
        };
        let base = inner.last_broadcast.as_ref();
        let changes = compute_changed_paths(base, &config, &Path::root());
        let structural = detect_structural_change(base, &config, &changes);
        debug!(
            changed = changes.len(),
            structural,
            "Sending config update"
        );

        let kind = MessageKind::ConfigUpdate {
            config: config.clone(),
            changed_paths: changes.to_strings(),
            is_structural_change: structural,
        };
        self.send(inner, kind, Some(config));
    }

    /// Queue best-effort delivery to the current peer
    fn send(&self, inner: &mut Inner, kind: MessageKind, snapshot: Option<Value>) {
        let Some(peer) = inner.peer else {
            debug!(message = kind.name(), "No preview attached, skipping send");
            inner.stats.sends_skipped += 1;
            return;
        };
        let message = ChannelMessage::new(kind, self.config.experiment_id.clone(), SourceTag::Editor);
        inner.effects.push(Effect::Send(Outbound {
            peer,
            message,
            snapshot,
            epoch: inner.epoch,
        }));
    }

    /// Validate and dispatch one inbound envelope; anything untrusted is
    /// dropped without a trace above `trace` level
    fn receive(self: &Arc<Self>, envelope: Envelope) {
        let message = self.validate(&envelope);
        self.update(|shared, inner| {
            if inner.state == ChannelState::Closed {
                return;
            }
            let Some(message) = message else {
                inner.stats.messages_dropped += 1;
                return;
            };
            match message.kind {
                MessageKind::PreviewConnected | MessageKind::Pong => {
                    shared.on_handshake(inner, envelope.sender);
                }
                MessageKind::PreviewReady => {
                    debug!(peer = %envelope.sender, "Preview ready");
                }
                MessageKind::ConfigUpdate { .. }
                | MessageKind::EditorClosed
                | MessageKind::Ping
                | MessageKind::Unknown => {
                    trace!(message = message.kind.name(), "Ignoring message");
                }
            }
        });
    }

    fn validate(&self, envelope: &Envelope) -> Option<ChannelMessage> {
        if envelope.origin != self.origin {
            trace!(origin = %envelope.origin, "Dropping message from foreign origin");
            return None;
        }
        let message = match ChannelMessage::from_json(&envelope.data) {
            Ok(message) => message,
            Err(e) => {
                trace!(error = %e, "Dropping malformed message");
                return None;
            }
        };
        if message.source != SourceTag::Preview {
            trace!(source = ?message.source, "Dropping message from unexpected role");
            return None;
        }
        if message.experiment_id != self.config.experiment_id {
            trace!(experiment = %message.experiment_id, "Dropping message for another experiment");
            return None;
        }
        Some(message)
    }

    fn on_handshake(&self, inner: &mut Inner, peer: PeerRef) {
        let fresh = inner.state != ChannelState::PreviewConnected || inner.peer != Some(peer);
        inner.peer = Some(peer);
        if !fresh {
            return;
        }

        if let Some(id) = inner.ping.take() {
            self.scheduler.cancel(id);
        }
        inner.transition(ChannelState::PreviewConnected);
        info!(%peer, "Preview connected");

        // The immediate flush supersedes whatever the debounce timer held
        if let Some(id) = inner.debounce.take() {
            self.scheduler.cancel(id);
        }
        self.flush(inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::memory::MemoryBus;
    use crate::scheduler::ManualScheduler;
    use serde_json::json;
    use std::time::Duration;

    /// Transport that answers every ping with a pong before `send` returns
    #[derive(Default)]
    struct Loopback {
        handler: Mutex<Option<InboundHandler>>,
        sent: Mutex<Vec<&'static str>>,
    }

    impl Transport for Loopback {
        fn send(
            &self,
            peer: PeerRef,
            target_origin: &str,
            message: &ChannelMessage,
        ) -> Result<(), TransportError> {
            lock(&self.sent).push(message.kind.name());
            if message.kind == MessageKind::Ping {
                let handler = lock(&self.handler).clone();
                if let Some(handler) = handler {
                    let pong = ChannelMessage::new(MessageKind::Pong, "exp-1", SourceTag::Preview);
                    handler(Envelope {
                        origin: target_origin.to_string(),
                        sender: peer,
                        data: pong.to_json()?,
                    });
                }
            }
            Ok(())
        }

        fn is_open(&self, _peer: PeerRef) -> bool {
            true
        }

        fn subscribe(&self, handler: InboundHandler) -> ListenerId {
            *lock(&self.handler) = Some(handler);
            ListenerId(1)
        }

        fn unsubscribe(&self, _id: ListenerId) {
            *lock(&self.handler) = None;
        }
    }

    const PREVIEW: &str = "http://localhost:5173";

    fn channel() -> (PreviewChannel, MemoryBus, Arc<ManualScheduler>) {
        let bus = MemoryBus::new();
        let scheduler = Arc::new(ManualScheduler::new());
        let channel = PreviewChannel::new(
            ChannelConfig::new("exp-1", format!("{PREVIEW}/preview")),
            Arc::new(bus.clone()),
            scheduler.clone(),
        )
        .unwrap();
        (channel, bus, scheduler)
    }

    #[test]
    fn test_open_is_idempotent() {
        let (channel, bus, _) = channel();
        channel.open();
        channel.open();
        assert_eq!(channel.state(), ChannelState::Open);
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_update_without_peer_keeps_base() {
        let (channel, _bus, scheduler) = channel();
        channel.open();
        channel.queue_config_update(Value::from(json!({"a": 1})));
        scheduler.advance(Duration::from_millis(1500));

        assert_eq!(channel.last_broadcast(), None);
        assert_eq!(channel.stats().sends_skipped, 1);
        assert!(!channel.has_pending_update());
    }

    #[test]
    fn test_state_listener_sees_transitions() {
        let (channel, bus, _) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.on_state_change(move |state| sink.lock().unwrap().push(state));

        channel.open();
        let endpoint = bus.open_peer(PREVIEW);
        endpoint.reply(MessageKind::PreviewConnected, "exp-1");
        channel.close();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ChannelState::Open,
                ChannelState::PreviewConnected,
                ChannelState::Closed
            ]
        );
    }

    #[test]
    fn test_transport_may_reply_from_inside_send() {
        let transport = Arc::new(Loopback::default());
        let scheduler = Arc::new(ManualScheduler::new());
        let channel = PreviewChannel::new(
            ChannelConfig::new("exp-1", PREVIEW),
            transport.clone(),
            scheduler.clone(),
        )
        .unwrap();
        channel.open();

        let config = Value::from(json!({"name": "Loop"}));
        channel.queue_config_update(config.clone());
        channel.attach_peer(PeerRef(7));
        scheduler.advance(Duration::from_millis(500));

        assert_eq!(channel.state(), ChannelState::PreviewConnected);
        assert_eq!(*lock(&transport.sent), vec!["ping", "config_update"]);
        assert_eq!(channel.last_broadcast(), Some(config));
        assert_eq!(channel.stats().updates_sent, 1);
        assert!(!channel.has_pending_update());

        channel.close();
        assert_eq!(*lock(&transport.sent), vec!["ping", "config_update", "editor_closed"]);
        assert!(lock(&transport.handler).is_none());
    }

    #[test]
    fn test_flush_now_reports_delivery() {
        let (channel, bus, _) = channel();
        channel.open();
        assert!(!channel.flush_now());

        let endpoint = bus.open_peer(PREVIEW);
        endpoint.reply(MessageKind::PreviewConnected, "exp-1");
        channel.queue_config_update(Value::from(json!({"a": 1})));
        assert!(channel.flush_now());
        assert!(!channel.has_pending_update());

        endpoint.close();
        channel.queue_config_update(Value::from(json!({"a": 2})));
        assert!(!channel.flush_now());
        assert_eq!(channel.last_broadcast(), Some(Value::from(json!({"a": 1}))));
    }

    #[test]
    fn test_closed_peer_demotes_state() {
        let (channel, bus, scheduler) = channel();
        channel.open();
        let endpoint = bus.open_peer(PREVIEW);
        endpoint.reply(MessageKind::PreviewConnected, "exp-1");
        assert_eq!(channel.state(), ChannelState::PreviewConnected);

        endpoint.close();
        channel.queue_config_update(Value::from(json!({"a": 1})));
        scheduler.advance(Duration::from_millis(1500));

        assert_eq!(channel.state(), ChannelState::Open);
        assert_eq!(channel.peer(), None);
    }
}
