//! # Stagesync Preview
//!
//! Live link between the config editor and a preview page.
//!
//! The editor queues every new config revision on a [`PreviewChannel`]. The
//! channel waits out a quiet period, diffs against what the preview last
//! received, and sends one `config_update`. Preview messages are accepted
//! only from the configured origin, with the preview role tag and the
//! channel's experiment id.
//!
//! Timers go through a [`Scheduler`] and delivery through a [`Transport`],
//! so the whole exchange can run on a virtual clock over a [`MemoryBus`].

pub mod channel;
pub mod config;
pub mod errors;
pub mod memory;
pub mod message;
pub mod scheduler;
pub mod transport;

pub use channel::{ChannelState, ChannelStats, PreviewChannel, StateListener};
pub use config::ChannelConfig;
pub use errors::{ChannelError, TransportError};
pub use memory::{MemoryBus, PreviewEndpoint};
pub use message::{ChannelMessage, MessageKind, SourceTag};
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerId, TokioScheduler};
pub use transport::{Envelope, InboundHandler, ListenerId, PeerRef, Transport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock ignoring poison; no state here is left half-written across a panic
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
