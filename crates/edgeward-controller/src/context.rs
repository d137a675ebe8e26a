//! Deadlines and cancellation for blocking calls made during a pass.

use crate::{ControllerError, ControllerResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Carries the per-call deadline and the process-wide cancellation signal
/// into every store and deployment service call of a pass.
#[derive(Debug, Clone)]
pub struct PassContext {
    cancel: watch::Receiver<bool>,
    call_timeout: Duration,
}

impl PassContext {
    /// `cancel` flips to `true` when in-flight calls must be abandoned.
    pub fn new(cancel: watch::Receiver<bool>, call_timeout: Duration) -> Self {
        Self {
            cancel,
            call_timeout,
        }
    }

    /// A context that is never cancelled.
    pub fn detached(call_timeout: Duration) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx, call_timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Run one blocking call, bounded by the call timeout and the cancel signal.
    pub async fn call<T, E, F>(&self, operation: &'static str, fut: F) -> ControllerResult<T>
    where
        F: Future<Output = Result<T, E>>,
        ControllerError: From<E>,
    {
        if self.is_cancelled() {
            return Err(ControllerError::Cancelled { operation });
        }

        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Err(ControllerError::Cancelled { operation }),
            result = tokio::time::timeout(self.call_timeout, fut) => match result {
                Ok(inner) => inner.map_err(ControllerError::from),
                Err(_) => Err(ControllerError::Timeout {
                    operation,
                    after: self.call_timeout,
                }),
            },
        }
    }
}

/// Resolves once cancellation is signalled. Never resolves if the sender is
/// dropped without signalling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
