//! # In-process Transport
//!
//! [`MemoryBus`] connects an editor-side [`crate::PreviewChannel`] to any
//! number of preview endpoints living in the same process. Each endpoint has
//! its own inbox and origin and can be closed to simulate a shut window. A
//! closed or dropped endpoint leaves the bus, so sends to it report
//! [`TransportError::UnknownPeer`].

use crate::errors::TransportError;
use crate::lock;
use crate::message::{ChannelMessage, MessageKind, SourceTag};
use crate::transport::{Envelope, InboundHandler, ListenerId, PeerRef, Transport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct PeerSlot {
    origin: String,
    inbox: mpsc::UnboundedSender<serde_json::Value>,
}

#[derive(Default)]
struct BusState {
    next_peer: u64,
    next_listener: u64,
    peers: HashMap<PeerRef, PeerSlot>,
    listeners: Vec<(ListenerId, InboundHandler)>,
}

#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a preview context running under `origin`
    pub fn open_peer(&self, origin: impl Into<String>) -> PreviewEndpoint {
        let origin = origin.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        state.next_peer += 1;
        let peer = PeerRef(state.next_peer);
        state.peers.insert(
            peer,
            PeerSlot {
                origin: origin.clone(),
                inbox: tx,
            },
        );
        PreviewEndpoint {
            state: self.state.clone(),
            peer,
            origin,
            inbox: rx,
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    /// Endpoints currently attached to the bus
    pub fn peer_count(&self) -> usize {
        lock(&self.state).peers.len()
    }

    /// Post a payload as if it came from `sender` under `origin`
    pub fn inject(&self, sender: PeerRef, origin: impl Into<String>, data: serde_json::Value) {
        deliver(
            &self.state,
            Envelope {
                origin: origin.into(),
                sender,
                data,
            },
        );
    }
}

fn deliver(state: &Arc<Mutex<BusState>>, envelope: Envelope) {
    // Handlers run without the bus lock so they can call back into the bus
    let handlers: Vec<InboundHandler> = lock(state)
        .listeners
        .iter()
        .map(|(_, handler)| handler.clone())
        .collect();
    for handler in handlers {
        handler(envelope.clone());
    }
}

impl Transport for MemoryBus {
    fn send(
        &self,
        peer: PeerRef,
        target_origin: &str,
        message: &ChannelMessage,
    ) -> Result<(), TransportError> {
        let state = lock(&self.state);
        let slot = state
            .peers
            .get(&peer)
            .ok_or(TransportError::UnknownPeer(peer.0))?;
        if slot.origin != target_origin {
            return Err(TransportError::OriginMismatch {
                target: target_origin.to_string(),
                actual: slot.origin.clone(),
            });
        }
        let data = message.to_json()?;
        slot.inbox
            .send(data)
            .map_err(|_| TransportError::PeerClosed(peer.0))
    }

    fn is_open(&self, peer: PeerRef) -> bool {
        lock(&self.state)
            .peers
            .get(&peer)
            .map(|slot| !slot.inbox.is_closed())
            .unwrap_or(false)
    }

    fn subscribe(&self, handler: InboundHandler) -> ListenerId {
        let mut state = lock(&self.state);
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, handler));
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        lock(&self.state).listeners.retain(|(lid, _)| *lid != id);
    }
}

fn decode(data: &serde_json::Value) -> Option<ChannelMessage> {
    match ChannelMessage::from_json(data) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, "Preview received undecodable payload");
            None
        }
    }
}

/// Preview side of a [`MemoryBus`] connection
pub struct PreviewEndpoint {
    state: Arc<Mutex<BusState>>,
    peer: PeerRef,
    origin: String,
    inbox: mpsc::UnboundedReceiver<serde_json::Value>,
}

impl PreviewEndpoint {
    pub fn peer(&self) -> PeerRef {
        self.peer
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Post a raw payload to the editor from this endpoint's origin
    pub fn post(&self, data: serde_json::Value) {
        self.post_from(self.origin.clone(), data);
    }

    /// Post a raw payload claiming an arbitrary origin
    pub fn post_from(&self, origin: impl Into<String>, data: serde_json::Value) {
        deliver(
            &self.state,
            Envelope {
                origin: origin.into(),
                sender: self.peer,
                data,
            },
        );
    }

    /// Post a well-formed preview message
    pub fn reply(&self, kind: MessageKind, experiment_id: &str) {
        let message = ChannelMessage::new(kind, experiment_id, SourceTag::Preview);
        match message.to_json() {
            Ok(data) => self.post(data),
            Err(e) => tracing::warn!(error = %e, "Failed to encode preview message"),
        }
    }

    /// Next message already waiting, skipping payloads that don't decode
    pub fn try_recv(&mut self) -> Option<ChannelMessage> {
        while let Ok(data) = self.inbox.try_recv() {
            if let Some(message) = decode(&data) {
                return Some(message);
            }
        }
        None
    }

    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        while let Some(data) = self.inbox.recv().await {
            if let Some(message) = decode(&data) {
                return Some(message);
            }
        }
        None
    }

    /// Everything received so far
    pub fn drain(&mut self) -> Vec<ChannelMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Simulate the preview window closing
    pub fn close(&self) {
        lock(&self.state).peers.remove(&self.peer);
    }
}

impl Drop for PreviewEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}
