use std::fmt;
use tokio::sync::oneshot;

/// Completion callback of a background execution window.
///
/// `complete` consumes the handle, so it can be invoked at most once.
pub struct CompletionHandle {
    callback: Box<dyn FnOnce(bool) + Send>,
}

impl CompletionHandle {
    pub fn new(callback: impl FnOnce(bool) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Handle paired with a receiver for the reported result
    pub fn channel() -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self::new(move |succeeded| {
            // Receiver gone means the host stopped waiting
            let _ = tx.send(succeeded);
        });
        (handle, rx)
    }

    pub fn complete(self, succeeded: bool) {
        (self.callback)(succeeded)
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle").finish_non_exhaustive()
    }
}
