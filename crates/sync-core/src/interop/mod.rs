//! Cross-region sharing mode and its reconciliation against server config

mod machine;
mod notice;
mod state;

pub use machine::{InteropSettings, InteropStateMachine, ReconcileReport};
pub use notice::{InteropNotice, LocalNotifier, INTEROP_TITLE_KEY};
pub use state::{InteropChoice, InteropState};
