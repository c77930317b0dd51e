//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Environment variable holding the backend base URL.
pub const BASE_URL_ENV: &str = "STOREFRONT_API_URL";

/// Base URL used when neither the config file nor the environment sets one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Root configuration for the API client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend location and transport settings.
    pub api: ApiConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Session and login flow settings.
    pub auth: AuthConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every relative path is joined onto.
    pub base_url: String,

    /// Total time allowed for a single attempt, in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Ignore proxy settings from the environment.
    pub no_proxy: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            user_agent: concat!("storefront-client/", env!("CARGO_PKG_VERSION")).to_string(),
            no_proxy: false,
        }
    }
}

/// CSRF token acquisition settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Path of the endpoint that sets the CSRF cookie, resolved against the
    /// origin of `api.base_url`.
    pub endpoint: String,

    /// Name of the cookie carrying the token.
    pub cookie_name: String,

    /// Request header the token is echoed back in.
    pub header_name: String,

    /// Timeout for the token fetch, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            endpoint: "/sanctum/csrf-cookie".to_string(),
            cookie_name: "XSRF-TOKEN".to_string(),
            header_name: "X-XSRF-TOKEN".to_string(),
            fetch_timeout_secs: 5,
        }
    }
}

/// Authentication and session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Login endpoint. A 401 from this path is reported, never redirected.
    pub login_endpoint: String,

    /// Logout endpoint.
    pub logout_endpoint: String,

    /// Endpoint returning the authenticated user's profile.
    pub me_endpoint: String,

    /// Location of the login screen redirects point at.
    pub login_page: String,

    /// File the session token and user profile are persisted to.
    /// `None` keeps the session in memory only.
    pub session_file: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_endpoint: "/auth/login".to_string(),
            logout_endpoint: "/auth/logout".to_string(),
            me_endpoint: "/auth/me".to_string(),
            login_page: "/login".to_string(),
            session_file: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries for a single request.
    pub max_retries: u32,

    /// Backoff unit in milliseconds; the n-th retry waits `n * base`.
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 1000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
