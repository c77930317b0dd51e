//! Redirect coordination between the data layer and the application shell.
//!
//! The client never navigates by itself. When a session is lost it publishes
//! a [`Redirect`] and fails the request with it; the shell subscribes and
//! decides how to get the user back to the login screen.

use tokio::sync::broadcast;

/// Why the user is being sent back to the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// The backend rejected the bearer token (HTTP 401).
    SessionExpired,
    /// A fresh CSRF token could not be obtained after a 419.
    CsrfError,
}

impl RedirectReason {
    /// Query flag appended to the login location.
    pub fn query_flag(&self) -> &'static str {
        match self {
            RedirectReason::SessionExpired => "session_expired",
            RedirectReason::CsrfError => "csrf_error",
        }
    }
}

/// A navigation request for the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub reason: RedirectReason,
    /// Login location including the reason flag, e.g. `/login?session_expired=true`.
    pub location: String,
}

impl Redirect {
    pub fn new(reason: RedirectReason, login_page: &str) -> Self {
        let separator = if login_page.contains('?') { '&' } else { '?' };
        Self {
            reason,
            location: format!("{}{}{}=true", login_page, separator, reason.query_flag()),
        }
    }
}

/// Broadcasts redirects to every subscribed shell component.
#[derive(Clone)]
pub struct Navigator {
    tx: broadcast::Sender<Redirect>,
}

impl Navigator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to redirect events.
    pub fn subscribe(&self) -> broadcast::Receiver<Redirect> {
        self.tx.subscribe()
    }

    /// Publish a redirect. Having no subscribers is not an error.
    pub fn publish(&self, redirect: Redirect) {
        tracing::info!(location = %redirect.location, "Redirect requested");
        let _ = self.tx.send(redirect);
    }

    /// Number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_flags() {
        let r = Redirect::new(RedirectReason::SessionExpired, "/login");
        assert_eq!(r.location, "/login?session_expired=true");

        let r = Redirect::new(RedirectReason::CsrfError, "/login?next=%2Forders");
        assert_eq!(r.location, "/login?next=%2Forders&csrf_error=true");
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let navigator = Navigator::new();
        let mut rx = navigator.subscribe();
        assert_eq!(navigator.receiver_count(), 1);

        navigator.publish(Redirect::new(RedirectReason::CsrfError, "/login"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.reason, RedirectReason::CsrfError);
    }
}
