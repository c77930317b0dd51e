//! Configuration validation.
//!
//! Serde handles syntax; this module checks values make sense together.
//! Every problem is reported, not just the first.

use std::fmt;

use url::Url;

use crate::config::schema::ClientConfig;

/// Upper bound on configured retries.
const MAX_RETRIES_LIMIT: u32 = 10;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "api.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("api.base_url", e.to_string())),
    }

    if config.api.request_timeout_secs == 0 {
        errors.push(ValidationError::new("api.request_timeout_secs", "must be greater than 0"));
    }
    if config.api.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("api.connect_timeout_secs", "must be greater than 0"));
    }

    if !config.csrf.endpoint.starts_with('/') {
        errors.push(ValidationError::new("csrf.endpoint", "must start with '/'"));
    }
    if config.csrf.cookie_name.trim().is_empty() {
        errors.push(ValidationError::new("csrf.cookie_name", "must not be empty"));
    }
    if config.csrf.header_name.trim().is_empty() {
        errors.push(ValidationError::new("csrf.header_name", "must not be empty"));
    }
    if config.csrf.fetch_timeout_secs == 0 {
        errors.push(ValidationError::new("csrf.fetch_timeout_secs", "must be greater than 0"));
    }

    for (field, path) in [
        ("auth.login_endpoint", &config.auth.login_endpoint),
        ("auth.logout_endpoint", &config.auth.logout_endpoint),
        ("auth.me_endpoint", &config.auth.me_endpoint),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
    }
    if config.auth.login_page.is_empty() {
        errors.push(ValidationError::new("auth.login_page", "must not be empty"));
    }

    if config.retries.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "retries.max_retries",
            format!("must be at most {}", MAX_RETRIES_LIMIT),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
