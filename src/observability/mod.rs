//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client, csrf, auth produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Request ID (`X-Request-Id`) is attached to every attempt and logged
//! - Token and credential values are never logged

pub mod logging;
pub mod metrics;
