//! Per-request cancellation.

use std::sync::Arc;

use tokio::sync::watch;

/// Handle that aborts the requests it is bound to.
///
/// Clones share state: cancelling any clone cancels them all. Cancelling
/// has no effect on the CSRF token cache or unrelated requests.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel with a reason. Only the first reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Resolves with the reason once the token is cancelled.
    pub async fn cancelled(&self) -> String {
        let mut rx = self.tx.subscribe();
        let reason = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|reason| reason.clone());

        match reason {
            Some(reason) => reason,
            // The sender lives as long as `self`, so this is unreachable in practice.
            None => std::future::pending().await,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
