//! # Live Session
//!
//! One editor tab with a live preview: a [`SyncCoordinator`] whose accepted
//! changes are queued on a [`PreviewChannel`].

use crate::coordinator::{ChangeOutcome, SyncCoordinator};
use crate::errors::SyncError;
use crate::view::ActiveView;
use stagesync_document::{FieldDecl, Value};
use stagesync_preview::{ChannelState, PreviewChannel};
use tracing::debug;

pub struct LiveSession {
    coordinator: SyncCoordinator,
    channel: PreviewChannel,
}

impl LiveSession {
    pub fn new(coordinator: SyncCoordinator, channel: PreviewChannel) -> Self {
        Self {
            coordinator,
            channel,
        }
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn channel(&self) -> &PreviewChannel {
        &self.channel
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Open the channel and queue the current document, so a preview that
    /// connects later is flushed straight away
    pub fn open(&mut self) {
        self.channel.open();
        if self.coordinator.is_valid() {
            self.channel
                .queue_config_update(self.coordinator.document().clone());
        }
    }

    pub fn close(&mut self) {
        self.channel.close();
    }

    pub fn set_view(&mut self, view: ActiveView) {
        self.coordinator.set_view(view);
    }

    pub fn current_data(&self) -> Value {
        self.coordinator.current_data()
    }

    pub fn handle_change(&mut self, path: &str, value: Value) -> Result<ChangeOutcome, SyncError> {
        let outcome = self.coordinator.handle_change(path, value)?;
        self.publish(outcome);
        Ok(outcome)
    }

    pub fn handle_removal(&mut self, path: &str) -> Result<ChangeOutcome, SyncError> {
        let outcome = self.coordinator.handle_removal(path)?;
        self.publish(outcome);
        Ok(outcome)
    }

    pub fn handle_batch_change(&mut self, patch: &Value) -> Result<ChangeOutcome, SyncError> {
        let outcome = self.coordinator.handle_batch_change(patch)?;
        self.publish(outcome);
        Ok(outcome)
    }

    pub fn apply_defaults(&mut self, fields: &[FieldDecl]) -> Result<ChangeOutcome, SyncError> {
        let outcome = self.coordinator.apply_defaults(fields)?;
        self.publish(outcome);
        Ok(outcome)
    }

    /// The text surface or the file on disk changed
    pub fn set_source(&mut self, text: impl Into<String>) -> ChangeOutcome {
        let outcome = self.coordinator.set_source(text);
        self.publish(outcome);
        outcome
    }

    fn publish(&self, outcome: ChangeOutcome) {
        if outcome.is_applied() {
            debug!(revision = self.coordinator.revision(), "Queueing preview update");
            self.channel
                .queue_config_update(self.coordinator.document().clone());
        }
    }
}
