//! The API client: one chokepoint for every backend call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::client::error::{ApiError, ErrorCode, RequestError, RequestResult};
use crate::client::request::{Request, RequestBody};
use crate::client::response::{decode_payload, unwrap_envelope};
use crate::client::upload::Upload;
use crate::config::ClientConfig;
use crate::csrf::{CookieJar, CsrfTokenManager};
use crate::navigation::{Navigator, Redirect, RedirectReason};
use crate::observability::metrics;
use crate::resilience::{Attempt, RetryDecision, RetryPolicy};
use crate::session::{SessionError, SessionStore};

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const REQUESTED_WITH_HEADER: HeaderName = HeaderName::from_static("x-requested-with");

/// Errors raised while constructing a client.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid CSRF header name '{0}'")]
    HeaderName(String),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    base_url: Url,
    jar: Arc<CookieJar>,
    csrf: CsrfTokenManager,
    csrf_header: HeaderName,
    session: SessionStore,
    navigator: Navigator,
    policy: RetryPolicy,
}

/// HTTP client for the admin backend.
///
/// Cheap to clone; clones share the cookie jar, CSRF cache, session and
/// navigator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client, opening the configured session file if any.
    pub fn new(config: ClientConfig) -> Result<Self, BuildError> {
        let session = match &config.auth.session_file {
            Some(path) => SessionStore::open(path)?,
            None => SessionStore::in_memory(),
        };
        Self::with_session(config, session)
    }

    pub fn with_session(config: ClientConfig, session: SessionStore) -> Result<Self, BuildError> {
        let base_url = Url::parse(&config.api.base_url)?;
        let jar = Arc::new(CookieJar::new(&base_url));

        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(Duration::from_secs(config.api.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.api.connect_timeout_secs))
            .user_agent(config.api.user_agent.clone());
        if config.api.no_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;

        let csrf = CsrfTokenManager::new(http.clone(), jar.clone(), &config.csrf, &base_url)?;
        let csrf_header = HeaderName::from_bytes(config.csrf.header_name.as_bytes())
            .map_err(|_| BuildError::HeaderName(config.csrf.header_name.clone()))?;
        let policy = RetryPolicy::from_config(&config.retries);

        tracing::debug!(
            base_url = %base_url,
            csrf_endpoint = %csrf.endpoint(),
            max_retries = policy.max_retries(),
            "API client initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                base_url,
                jar,
                csrf,
                csrf_header,
                session,
                navigator: Navigator::new(),
                policy,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn csrf(&self) -> &CsrfTokenManager {
        &self.inner.csrf
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn navigator(&self) -> &Navigator {
        &self.inner.navigator
    }

    pub fn cookie_jar(&self) -> &CookieJar {
        &self.inner.jar
    }

    /// Prime the CSRF token. Call once at startup.
    pub async fn initialize_csrf_token(&self) -> bool {
        match self.inner.csrf.ensure_token().await {
            Ok(_) => {
                tracing::info!("CSRF token initialized");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "CSRF token initialization failed");
                false
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> RequestResult<T> {
        self.send(Request::new(Method::GET, path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> RequestResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Request::new(Method::POST, path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> RequestResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Request::new(Method::PUT, path).json(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> RequestResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Request::new(Method::PATCH, path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> RequestResult<T> {
        self.send(Request::new(Method::DELETE, path)).await
    }

    /// POST a multipart upload.
    pub async fn upload<T: DeserializeOwned>(&self, path: &str, upload: Upload) -> RequestResult<T> {
        self.send(Request::new(Method::POST, path).upload(upload)).await
    }

    /// Execute an arbitrary request and decode the unwrapped payload.
    pub async fn send<T: DeserializeOwned>(&self, request: Request) -> RequestResult<T> {
        let (status, data) = match request.options.cancel.clone() {
            Some(token) => {
                tokio::select! {
                    biased;
                    reason = token.cancelled() => {
                        tracing::debug!(method = %request.method, path = %request.path, reason = %reason, "Request cancelled");
                        return Err(RequestError::Cancelled { reason });
                    }
                    result = self.execute(&request) => result?,
                }
            }
            None => self.execute(&request).await?,
        };

        Ok(decode_payload(status, data)?)
    }

    /// Run the attempt loop for one logical request.
    async fn execute(&self, request: &Request) -> RequestResult<(u16, Value)> {
        let url = self.resolve_url(&request.path)?;
        let is_login = self.is_login_path(&request.path);
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut attempt = Attempt::first();

        loop {
            let csrf_token = if request.needs_csrf() {
                Some(self.inner.csrf.ensure_token().await?)
            } else {
                None
            };

            let builder = self.build_attempt(request, &url, &request_id, csrf_token.as_deref())?;

            tracing::debug!(
                method = %request.method,
                url = %url,
                request_id = %request_id,
                retries = attempt.retries,
                "Sending request"
            );

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    metrics::record_request(request.method.as_str(), 0);
                    tracing::warn!(method = %request.method, url = %url, error = %e, "Request failed without response");
                    return Err(ApiError::from_transport(e).into());
                }
            };

            let status = response.status().as_u16();
            metrics::record_request(request.method.as_str(), status);
            let body = response.bytes().await.map_err(ApiError::from_transport)?;

            if (200..300).contains(&status) {
                return Ok((status, unwrap_envelope(status, &body)?));
            }

            match self
                .inner
                .policy
                .decide(status, attempt, is_login, request.needs_csrf())
            {
                RetryDecision::Redirect(reason) => {
                    tracing::warn!(status, url = %url, request_id = %request_id, "Authentication lost, redirecting to login");
                    return Err(self.redirect(reason));
                }
                RetryDecision::RefreshCsrf => {
                    tracing::warn!(url = %url, request_id = %request_id, "CSRF token mismatch, refreshing");
                    metrics::record_retry("csrf_mismatch");
                    self.inner.csrf.invalidate();
                    attempt = attempt.after_csrf_refresh();
                    if let Err(e) = self.inner.csrf.ensure_token().await {
                        tracing::warn!(error = %e, "CSRF token refresh failed");
                        return Err(self.redirect(RedirectReason::CsrfError));
                    }
                }
                RetryDecision::Backoff(delay) => {
                    attempt = attempt.next_retry();
                    metrics::record_retry("unavailable");
                    tracing::info!(
                        status,
                        url = %url,
                        request_id = %request_id,
                        retry = attempt.retries,
                        delay_ms = delay.as_millis() as u64,
                        "Backend unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Fail => {
                    return Err(ApiError::from_response(status, &body).into());
                }
            }
        }
    }

    fn build_attempt(
        &self,
        request: &Request,
        url: &Url,
        request_id: &str,
        csrf_token: Option<&String>,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut headers: HeaderMap = request.options.headers.clone();
        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static("application/json"));
        headers.insert(REQUESTED_WITH_HEADER, HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(REQUEST_ID_HEADER, header_value(request_id)?);

        if request.is_multipart() {
            // reqwest sets multipart/form-data with the boundary.
            headers.remove(CONTENT_TYPE);
        } else {
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
        }

        if let Some(token) = csrf_token {
            headers.insert(self.inner.csrf_header.clone(), header_value(token)?);
        }

        // Credentials never leave the backend origin.
        if url.origin() == self.inner.base_url.origin() {
            if let Some(token) = self.inner.session.token() {
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
            }
        }

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers);

        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Multipart(upload) => builder.multipart(upload.to_form()?),
        };

        Ok(builder)
    }

    /// `/`-prefixed paths hang off the base URL; absolute URLs pass through.
    fn resolve_url(&self, path: &str) -> Result<Url, ApiError> {
        let invalid = |e: url::ParseError| {
            ApiError::new(ErrorCode::Unknown, format!("Invalid request URL '{}': {}", path, e))
        };

        if !path.starts_with('/') {
            if let Ok(url) = Url::parse(path) {
                return Ok(url);
            }
        }

        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let joined = format!("{}/{}", base, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(invalid)
    }

    fn is_login_path(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        path.ends_with(&self.inner.config.auth.login_endpoint)
    }

    fn redirect(&self, reason: RedirectReason) -> RequestError {
        if reason == RedirectReason::SessionExpired {
            if let Err(e) = self.inner.session.clear() {
                tracing::warn!(error = %e, "Failed to clear expired session");
            }
        }

        let redirect = Redirect::new(reason, &self.inner.config.auth.login_page);
        metrics::record_redirect(reason.query_flag());
        self.inner.navigator.publish(redirect.clone());
        RequestError::Redirect(redirect)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|e| ApiError::new(ErrorCode::Unknown, "Invalid header value").with_source(e))
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("csrf", &self.inner.csrf)
            .field("session", &self.inner.session)
            .finish()
    }
}
