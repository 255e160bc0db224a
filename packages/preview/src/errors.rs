//! Error types for the preview channel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Invalid preview URL: {0}")]
    InvalidPreviewUrl(#[from] url::ParseError),

    #[error("Preview URL has no usable origin: {0}")]
    OpaqueOrigin(String),
}

/// Why a transport could not deliver a message
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unknown peer {0}")]
    UnknownPeer(u64),

    #[error("Peer {0} is closed")]
    PeerClosed(u64),

    #[error("Target origin {target} does not match peer origin {actual}")]
    OriginMismatch { target: String, actual: String },

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
