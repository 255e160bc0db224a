//! # Stagesync Editor
//!
//! Keeps an experiment config's text, its parsed tree and the live preview
//! in step.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ codec: YAML / JSON text ⇄ Value             │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ coordinator: edits through the active view  │
//! │  - path edits and batch merges              │
//! │  - sticky parse errors                      │
//! │  - echo suppression after our own writes    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: accepted revisions → preview       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use stagesync_editor::{ChangeOutcome, SyncCoordinator, YamlCodec};
//! use stagesync_document::Value;
//! use stagesync_preview::ManualScheduler;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualScheduler::new());
//! let mut coordinator = SyncCoordinator::new(Box::new(YamlCodec), clock, "name: Survey\n");
//!
//! let outcome = coordinator.handle_change("name", Value::from("Pilot")).unwrap();
//! assert_eq!(outcome, ChangeOutcome::Applied);
//! assert_eq!(coordinator.source(), "name: Pilot\n");
//! ```

mod codec;
mod coordinator;
mod errors;
mod session;
mod view;

pub use codec::{codec_for_path, JsonCodec, TextCodec, YamlCodec};
pub use coordinator::{
    ChangeOutcome, Provenance, SyncCoordinator, TextSink, DEFAULT_SETTLE_WINDOW,
};
pub use errors::{CodecError, SyncError};
pub use session::LiveSession;
pub use view::ActiveView;
