//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Response with error status:
//!     → retries.rs (classify: redirect, refresh CSRF, back off, fail)
//!     → backoff.rs (linear delay for transient unavailability)
//! ```
//!
//! # Design Decisions
//! - Retry state is a value passed through the loop, never shared
//! - Retries of one request are strictly sequential
//! - Bounded retry budget per request (default 2)

pub mod backoff;
pub mod retries;

pub use backoff::linear_backoff;
pub use retries::{Attempt, RetryDecision, RetryPolicy};
