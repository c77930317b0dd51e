//! Client-side metrics.
//!
//! # Metrics
//! - `storefront_client_requests_total` (counter): attempts by method, status
//! - `storefront_client_retries_total` (counter): retries by reason
//! - `storefront_client_csrf_fetches_total` (counter): token fetches by outcome
//! - `storefront_client_redirects_total` (counter): redirects by reason
//!
//! Recording goes through the `metrics` facade; installing an exporter is
//! left to the embedding application.

/// Record one completed attempt. `status` is 0 when no response arrived.
pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "storefront_client_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_retry(reason: &'static str) {
    metrics::counter!("storefront_client_retries_total", "reason" => reason).increment(1);
}

pub fn record_csrf_fetch(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("storefront_client_csrf_fetches_total", "outcome" => outcome).increment(1);
}

pub fn record_redirect(reason: &'static str) {
    metrics::counter!("storefront_client_redirects_total", "reason" => reason).increment(1);
}
