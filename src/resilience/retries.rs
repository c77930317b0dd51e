//! Retry decisions for failed responses.
//!
//! # Rules
//! - 401 outside the login endpoint: redirect, never retried
//! - 419 on a request carrying a CSRF token: refresh the token and resubmit
//!   once; a second 419 redirects. Requests without a token just fail.
//! - 503/504: linear backoff, up to `max_retries`
//! - anything else: fail with the normalized error

use std::time::Duration;

use crate::config::RetryConfig;
use crate::navigation::RedirectReason;
use crate::resilience::backoff::linear_backoff;

/// Per-request retry state, threaded by value through the retry loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attempt {
    /// Retries already performed for this request.
    pub retries: u32,
    /// Whether the CSRF token has already been refreshed for this request.
    pub csrf_refreshed: bool,
}

impl Attempt {
    pub fn first() -> Self {
        Self::default()
    }

    pub fn next_retry(self) -> Self {
        Self {
            retries: self.retries + 1,
            ..self
        }
    }

    pub fn after_csrf_refresh(self) -> Self {
        Self {
            retries: self.retries + 1,
            csrf_refreshed: true,
        }
    }
}

/// What to do with a non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Redirect(RedirectReason),
    RefreshCsrf,
    Backoff(Duration),
    Fail,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base_ms)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide how to handle `status` for a request in state `attempt`.
    ///
    /// `uses_csrf` is false for GETs and external URLs, which never send a
    /// token and so have nothing to refresh.
    pub fn decide(
        &self,
        status: u16,
        attempt: Attempt,
        is_login: bool,
        uses_csrf: bool,
    ) -> RetryDecision {
        let budget_left = attempt.retries < self.max_retries;
        match status {
            401 if !is_login => RetryDecision::Redirect(RedirectReason::SessionExpired),
            419 if !uses_csrf => RetryDecision::Fail,
            419 if attempt.csrf_refreshed => RetryDecision::Redirect(RedirectReason::CsrfError),
            419 if budget_left => RetryDecision::RefreshCsrf,
            503 | 504 if budget_left => RetryDecision::Backoff(linear_backoff(
                attempt.retries + 1,
                self.backoff_base_ms,
            )),
            _ => RetryDecision::Fail,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
