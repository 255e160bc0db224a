//! Message transport seam between the channel and whatever carries bytes to
//! the preview (a browser window, a socket, an in-process bus).

use crate::errors::TransportError;
use crate::message::ChannelMessage;
use std::fmt;
use std::sync::Arc;

/// Opaque handle naming one preview context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerRef(pub u64);

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// One inbound message as the transport saw it
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Origin the sender runs under, as reported by the transport
    pub origin: String,

    /// Context that sent the message
    pub sender: PeerRef,

    /// Undecoded payload
    pub data: serde_json::Value,
}

pub type InboundHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Carrier between a [`crate::PreviewChannel`] and its preview.
///
/// The channel never holds its own lock while calling in here, so any method
/// may invoke a subscribed handler before returning.
pub trait Transport: Send + Sync {
    /// Deliver `message` to `peer`, which must be running under
    /// `target_origin`
    fn send(
        &self,
        peer: PeerRef,
        target_origin: &str,
        message: &ChannelMessage,
    ) -> Result<(), TransportError>;

    /// Whether `peer` can still receive messages
    fn is_open(&self, peer: PeerRef) -> bool;

    /// Register a handler for every inbound envelope
    fn subscribe(&self, handler: InboundHandler) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);
}
