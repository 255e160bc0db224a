//! # Channel Messages
//!
//! Wire shape shared with the preview page. Every message is a flat object:
//!
//! ```json
//! {
//!   "type": "config_update",
//!   "experimentId": "exp-1",
//!   "timestamp": 1700000000000,
//!   "source": "stagesync-editor",
//!   "config": { ... },
//!   "changedPaths": ["phases[0].stages[1].title"],
//!   "isStructuralChange": false
//! }
//! ```

use serde::{Deserialize, Serialize};
use stagesync_document::Value;

/// Role of the sending side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "stagesync-editor")]
    Editor,

    #[serde(rename = "stagesync-preview")]
    Preview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    /// Editor → preview: the config to display and how it differs from the
    /// previous one
    ConfigUpdate {
        config: Value,
        #[serde(rename = "changedPaths")]
        changed_paths: Vec<String>,
        #[serde(rename = "isStructuralChange")]
        is_structural_change: bool,
    },

    /// Preview → editor: page loaded
    PreviewReady,

    /// Preview → editor: handshake
    PreviewConnected,

    /// Editor → preview: editor is going away
    EditorClosed,

    /// Editor → preview: keepalive probe
    Ping,

    /// Preview → editor: keepalive answer
    Pong,

    /// Any type this build doesn't know
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::ConfigUpdate { .. } => "config_update",
            MessageKind::PreviewReady => "preview_ready",
            MessageKind::PreviewConnected => "preview_connected",
            MessageKind::EditorClosed => "editor_closed",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    #[serde(flatten)]
    pub kind: MessageKind,
    pub experiment_id: String,
    pub timestamp: i64,
    pub source: SourceTag,
}

impl ChannelMessage {
    /// Build a message stamped with the current wall-clock time
    pub fn new(kind: MessageKind, experiment_id: impl Into<String>, source: SourceTag) -> Self {
        Self {
            kind,
            experiment_id: experiment_id.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            source,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Decode an untrusted payload
    pub fn from_json(data: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(data)
    }
}
