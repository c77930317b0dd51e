//! Linear backoff between retries.

use std::time::Duration;

/// Delay before the `retry`-th retry: `retry * base_ms`.
///
/// Retry numbering starts at 1; `retry == 0` means no wait.
pub fn linear_backoff(retry: u32, base_ms: u64) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(u64::from(retry)))
}
