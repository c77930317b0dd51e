//! CSRF token acquisition and caching.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use reqwest::header::{ACCEPT, SET_COOKIE};
use tokio::sync::Mutex;
use tokio::time::timeout;
use url::Url;

use crate::client::error::ApiError;
use crate::config::CsrfConfig;
use crate::csrf::cookies::CookieJar;
use crate::observability::metrics;

/// Single-slot CSRF token cache with single-flight refresh.
///
/// The cached token is read lock-free. A fetch holds `fetch_lock` for its
/// whole duration, so concurrent callers queue on the lock and then find
/// the token already cached instead of issuing their own request.
pub struct CsrfTokenManager {
    http: reqwest::Client,
    jar: Arc<CookieJar>,
    endpoint: Url,
    cookie_name: String,
    header_name: String,
    fetch_timeout: Duration,
    token: ArcSwapOption<String>,
    fetch_lock: Mutex<()>,
}

impl CsrfTokenManager {
    /// `config.endpoint` is resolved against the origin of `base_url`.
    pub fn new(
        http: reqwest::Client,
        jar: Arc<CookieJar>,
        config: &CsrfConfig,
        base_url: &Url,
    ) -> Result<Self, url::ParseError> {
        let endpoint = base_url.join(&config.endpoint)?;
        Ok(Self {
            http,
            jar,
            endpoint,
            cookie_name: config.cookie_name.clone(),
            header_name: config.header_name.clone(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            token: ArcSwapOption::empty(),
            fetch_lock: Mutex::new(()),
        })
    }

    /// Header the token is sent in.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Currently cached token, without any I/O.
    pub fn token(&self) -> Option<Arc<String>> {
        self.token.load_full()
    }

    /// Return the cached token, fetching it first if absent.
    pub async fn ensure_token(&self) -> Result<Arc<String>, ApiError> {
        if let Some(token) = self.token.load_full() {
            return Ok(token);
        }

        let _guard = self.fetch_lock.lock().await;

        // Whoever held the lock before us may have populated the cache.
        if let Some(token) = self.token.load_full() {
            return Ok(token);
        }

        let token = self.fetch().await?;
        self.token.store(Some(token.clone()));
        Ok(token)
    }

    /// Drop the cached token and its cookie.
    pub fn invalidate(&self) {
        self.token.store(None);
        self.jar.remove(&self.cookie_name);
        tracing::debug!(cookie = %self.cookie_name, "CSRF token invalidated");
    }

    async fn fetch(&self) -> Result<Arc<String>, ApiError> {
        tracing::debug!(endpoint = %self.endpoint, "Fetching CSRF token");

        let request = self
            .http
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .send();

        let response = match timeout(self.fetch_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                metrics::record_csrf_fetch(false);
                tracing::warn!(error = %e, "CSRF token fetch failed");
                return Err(ApiError::token_fetch(format!("Failed to fetch CSRF token: {}", e))
                    .with_source(e));
            }
            Err(_) => {
                metrics::record_csrf_fetch(false);
                tracing::warn!(timeout_secs = self.fetch_timeout.as_secs(), "CSRF token fetch timed out");
                return Err(ApiError::token_fetch(format!(
                    "CSRF token fetch timed out after {} seconds",
                    self.fetch_timeout.as_secs()
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            metrics::record_csrf_fetch(false);
            tracing::warn!(status = %status, "CSRF endpoint returned an error status");
            return Err(ApiError::token_fetch(format!(
                "CSRF endpoint returned status {}",
                status.as_u16()
            ))
            .with_status(status.as_u16()));
        }

        // Usually already stored by the cookie provider.
        for value in response.headers().get_all(SET_COOKIE) {
            if let Ok(value) = value.to_str() {
                self.jar.store_set_cookie(value);
            }
        }

        match self.jar.get_decoded(&self.cookie_name).filter(|t| !t.is_empty()) {
            Some(token) => {
                metrics::record_csrf_fetch(true);
                tracing::debug!("CSRF token cached");
                Ok(Arc::new(token))
            }
            None => {
                metrics::record_csrf_fetch(false);
                Err(ApiError::token_fetch(format!(
                    "CSRF cookie '{}' missing from response",
                    self.cookie_name
                )))
            }
        }
    }
}

impl std::fmt::Debug for CsrfTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfTokenManager")
            .field("endpoint", &self.endpoint.as_str())
            .field("cookie_name", &self.cookie_name)
            .field("cached", &self.token.load().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::ErrorCode;

    fn manager(base: &str, config: &CsrfConfig) -> CsrfTokenManager {
        let base = Url::parse(base).unwrap();
        let jar = Arc::new(CookieJar::new(&base));
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        CsrfTokenManager::new(http, jar, config, &base).unwrap()
    }

    #[test]
    fn test_endpoint_resolves_against_origin() {
        let m = manager("http://localhost:8000/api/v1/", &CsrfConfig::default());
        assert_eq!(m.endpoint().as_str(), "http://localhost:8000/sanctum/csrf-cookie");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_token_fetch_error() {
        let mut config = CsrfConfig::default();
        config.fetch_timeout_secs = 1;
        // Port 9 (discard) on loopback is essentially never listening.
        let m = manager("http://127.0.0.1:9/api", &config);

        let err = m.ensure_token().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenFetch);
        assert!(m.token().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache_and_cookie() {
        let m = manager("http://127.0.0.1:9/api", &CsrfConfig::default());
        m.jar.store_set_cookie("XSRF-TOKEN=abc");
        m.token.store(Some(Arc::new("abc".into())));

        assert_eq!(m.ensure_token().await.unwrap().as_str(), "abc");
        m.invalidate();
        assert!(m.token().is_none());
        assert!(m.jar.get("XSRF-TOKEN").is_none());
    }
}
