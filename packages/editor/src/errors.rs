//! Error types for the editor

use stagesync_document::PathError;
use stagesync_preview::ChannelError;
use thiserror::Error;

/// Text could not be turned into a config document or back
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config root must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Parse error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    #[error("No item {index} in {collection} (length {len})")]
    ItemOutOfRange {
        collection: String,
        index: usize,
        len: usize,
    },

    #[error("{collection} is not a list")]
    NotACollection { collection: String },

    #[error("Edit data for this view must be an object, found {0}")]
    NotAnObject(&'static str),

    #[error("Preview channel error: {0}")]
    Channel(#[from] ChannelError),
}
