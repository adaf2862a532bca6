//! Background execution window handling
//!
//! The host delivers a bounded time budget and a single completion callback.
//! The orchestrator runs the config fetch and padding traffic against that
//! budget, starts the SDK sync alongside them, and reports exactly once.

mod completion;
mod orchestrator;
mod padding;

#[cfg(test)]
mod tests;

pub use completion::CompletionHandle;
pub use orchestrator::{BackgroundOrchestrator, BackgroundRun, SubtaskOutcome};
pub use padding::{HttpPaddingRequest, PaddingRequest, PADDING_HEADER};

/// Resets "not synced in a while" reminders
pub trait SyncWarningNotifier: Send + Sync {
    fn reset_warnings(&self);
}
