//! # Sync Coordinator
//!
//! Owns the config as both text and tree and keeps them in step.
//!
//! Form edits arrive as `(path, value)` pairs relative to the active view.
//! The coordinator applies them to the last valid document, re-encodes the
//! whole config and hands the text to the sink. Writing that text back into
//! the editor surface produces a change notification of its own; the
//! coordinator ignores it within a short settle window instead of treating
//! it as a fresh external edit.
//!
//! ```text
//! handle_change ──▶ set ──▶ reassemble ──▶ encode ──▶ sink
//!                                                        │
//! set_source ◀──────────── echo (ignored) ◀──────────────┘
//! ```

use crate::codec::TextCodec;
use crate::errors::{CodecError, SyncError};
use crate::view::ActiveView;
use stagesync_document::{model, resolve_defaults, FieldDecl, Path, Value};
use stagesync_preview::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_millis(50);

/// Who last changed the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provenance {
    /// Typed into the text surface or loaded from disk
    #[default]
    External,
    /// Produced by a form edit through this coordinator
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Document updated and the sink called
    Applied,
    /// Inside the settle window of a previous edit
    Suppressed,
    /// Source text doesn't parse; nothing changed
    Invalid,
    /// Text identical to the current source
    Unchanged,
}

impl ChangeOutcome {
    pub fn is_applied(self) -> bool {
        self == ChangeOutcome::Applied
    }
}

pub type TextSink = Box<dyn FnMut(&str) + Send>;

pub struct SyncCoordinator {
    codec: Box<dyn TextCodec>,
    clock: Arc<dyn Scheduler>,
    settle_window: Duration,

    source: String,
    /// Last document that parsed
    document: Value,
    parse_error: Option<CodecError>,

    provenance: Provenance,
    guard_until: Option<Duration>,
    view: ActiveView,
    sink: Option<TextSink>,
    revision: u64,
}

impl SyncCoordinator {
    /// Coordinator over `source`; a parse failure is recorded, not returned
    pub fn new(codec: Box<dyn TextCodec>, clock: Arc<dyn Scheduler>, source: impl Into<String>) -> Self {
        let mut coordinator = Self {
            codec,
            clock,
            settle_window: DEFAULT_SETTLE_WINDOW,
            source: String::new(),
            document: Value::object(),
            parse_error: None,
            provenance: Provenance::External,
            guard_until: None,
            view: ActiveView::Whole,
            sink: None,
            revision: 0,
        };
        coordinator.load(source.into());
        coordinator
    }

    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    /// Receive the encoded text of every accepted edit
    pub fn set_sink(&mut self, sink: impl FnMut(&str) + Send + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Last document that parsed, regardless of the active view
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn parse_error(&self) -> Option<&CodecError> {
        self.parse_error.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.parse_error.is_none()
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Bumped on every document change from either side
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn view(&self) -> &ActiveView {
        &self.view
    }

    pub fn set_view(&mut self, view: ActiveView) {
        debug!(?view, "Active view changed");
        self.view = view;
    }

    pub fn is_guarded(&self) -> bool {
        self.guard_until
            .is_some_and(|until| self.clock.now() < until)
    }

    /// Data for the active view; empty when the source doesn't parse or the
    /// view points at nothing
    pub fn current_data(&self) -> Value {
        if !self.is_valid() {
            return Value::object();
        }
        self.view
            .project(&self.document)
            .unwrap_or_else(Value::object)
    }

    /// Set one field of the active view's data
    pub fn handle_change(&mut self, path: &str, value: Value) -> Result<ChangeOutcome, SyncError> {
        let path = Path::parse(path)?;
        self.edit(|data| model::set(data, &path, value))
    }

    /// Clear one field of the active view's data
    pub fn handle_removal(&mut self, path: &str) -> Result<ChangeOutcome, SyncError> {
        let path = Path::parse(path)?;
        self.edit(|data| model::remove(data, &path))
    }

    /// Deep-merge `patch` into the active view's data in one edit
    pub fn handle_batch_change(&mut self, patch: &Value) -> Result<ChangeOutcome, SyncError> {
        self.edit(|data| model::merge(data, patch))
    }

    /// Fill declared defaults missing from the active view's data
    pub fn apply_defaults(&mut self, fields: &[FieldDecl]) -> Result<ChangeOutcome, SyncError> {
        if !self.is_valid() {
            return Ok(ChangeOutcome::Invalid);
        }
        match resolve_defaults(&self.current_data(), fields) {
            Some(patch) => self.handle_batch_change(&patch),
            None => Ok(ChangeOutcome::Unchanged),
        }
    }

    /// The text surface changed
    pub fn set_source(&mut self, text: impl Into<String>) -> ChangeOutcome {
        let text = text.into();
        if self.is_guarded() {
            debug!("Ignoring source change inside settle window");
            return ChangeOutcome::Suppressed;
        }
        if text == self.source {
            return ChangeOutcome::Unchanged;
        }
        self.provenance = Provenance::External;
        self.load(text)
    }

    fn load(&mut self, text: String) -> ChangeOutcome {
        let outcome = match self.codec.decode(&text) {
            Ok(document) => {
                self.document = document;
                self.parse_error = None;
                self.revision += 1;
                ChangeOutcome::Applied
            }
            Err(e) => {
                warn!(codec = self.codec.name(), error = %e, "Config does not parse, keeping last valid document");
                self.parse_error = Some(e);
                ChangeOutcome::Invalid
            }
        };
        self.source = text;
        outcome
    }

    fn edit(&mut self, apply: impl FnOnce(&Value) -> Value) -> Result<ChangeOutcome, SyncError> {
        if self.is_guarded() {
            debug!("Ignoring edit inside settle window");
            return Ok(ChangeOutcome::Suppressed);
        }
        if !self.is_valid() {
            return Ok(ChangeOutcome::Invalid);
        }

        let data = apply(&self.current_data());
        let document = self.view.reassemble(&self.document, data)?;
        let text = self.codec.encode(&document)?;

        self.provenance = Provenance::Internal;
        self.document = document;
        self.source = text;
        self.revision += 1;
        self.guard_until = Some(self.clock.now() + self.settle_window);

        if let Some(sink) = self.sink.as_mut() {
            sink(&self.source);
        }
        Ok(ChangeOutcome::Applied)
    }
}
