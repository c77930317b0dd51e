//! Normalized request errors.
//!
//! Every failure leaving [`ApiClient`](crate::client::ApiClient) is one of:
//! - [`RequestError::Api`]: a well-formed [`ApiError`]
//! - [`RequestError::Redirect`]: the session is gone, the shell must navigate
//! - [`RequestError::Cancelled`]: the caller aborted the request

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::navigation::{Redirect, RedirectReason};

/// Message used when neither the backend nor the transport supplied one.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Machine-readable classification of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No connectivity to the backend.
    Network,
    /// A deadline was exceeded.
    Timeout,
    /// The CSRF token could not be obtained.
    TokenFetch,
    /// The request was aborted by the caller.
    Cancelled,
    /// Code supplied by the backend in the response envelope.
    Backend(String),
    /// Anything else.
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Network => "network_error",
            ErrorCode::Timeout => "timeout_error",
            ErrorCode::TokenFetch => "token_fetch_error",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Backend(code) => code,
            ErrorCode::Unknown => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name to validation messages.
pub type FieldErrors = HashMap<String, Vec<String>>;

/// A normalized API failure. Never mutated after creation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable message.
    pub message: String,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Field-level validation errors (empty when none).
    pub errors: FieldErrors,
    pub code: ErrorCode,
    /// Underlying transport or decode error, for diagnostics.
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            errors: FieldErrors::new(),
            code,
            source: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Classify a transport-level failure (no usable response).
    pub fn from_transport(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::Timeout
        } else if err.is_connect() || err.is_request() {
            ErrorCode::Network
        } else {
            ErrorCode::Unknown
        };
        let message = non_empty(err.to_string()).unwrap_or_else(|| GENERIC_ERROR_MESSAGE.into());
        let status = err.status().map(|s| s.as_u16());

        let mut api_error = ApiError::new(code, message).with_source(err);
        api_error.status = status;
        api_error
    }

    /// Build an error from a non-success response body.
    ///
    /// The body is expected to follow the `{message, errors, code}` envelope;
    /// anything else falls back to the status reason.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let envelope: Option<Value> = serde_json::from_slice(body).ok();

        let message = envelope
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .and_then(|m| non_empty(m.to_string()))
            .or_else(|| {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .map(|reason| format!("Request failed with status {} ({})", status, reason))
            })
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());

        let code = envelope
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(Value::as_str)
            .and_then(|c| non_empty(c.to_string()))
            .map(ErrorCode::Backend)
            .unwrap_or(ErrorCode::Unknown);

        let errors = envelope
            .as_ref()
            .and_then(|v| v.get("errors"))
            .map(parse_field_errors)
            .unwrap_or_default();

        Self {
            message,
            status: Some(status),
            errors,
            code,
            source: None,
        }
    }

    /// CSRF priming failed.
    pub fn token_fetch(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::TokenFetch, message)
    }

    /// A success response whose payload could not be decoded.
    pub fn decode(status: u16, err: serde_json::Error) -> Self {
        ApiError::new(ErrorCode::Unknown, format!("Invalid response payload: {}", err))
            .with_status(status)
            .with_source(err)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Accepts `{field: [msg, ...]}` as well as `{field: msg}`.
fn parse_field_errors(value: &Value) -> FieldErrors {
    let Some(map) = value.as_object() else {
        return FieldErrors::new();
    };

    map.iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items
                    .iter()
                    .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                    .collect(),
                Value::String(s) => vec![s.clone()],
                other => vec![other.to_string()],
            };
            (field.clone(), messages)
        })
        .collect()
}

/// Error returned by every public request method.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The shell must navigate to `location`; no retry will follow.
    #[error("redirecting to {}", .0.location)]
    Redirect(Redirect),

    #[error("request cancelled: {reason}")]
    Cancelled { reason: String },
}

impl RequestError {
    pub fn is_api_error(&self) -> bool {
        matches!(self, RequestError::Api(_))
    }

    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            RequestError::Api(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, RequestError::Redirect(_))
    }
}

/// Result type for client operations.
pub type RequestResult<T> = Result<T, RequestError>;

/// Flatten any request failure into an [`ApiError`] fit for display, and log it.
pub fn handle_error(err: &RequestError) -> ApiError {
    let api_error = match err {
        RequestError::Api(e) => e.clone(),
        RequestError::Redirect(redirect) => match redirect.reason {
            RedirectReason::SessionExpired => {
                ApiError::new(ErrorCode::Unknown, "Your session has expired. Please log in again.")
                    .with_status(401)
            }
            RedirectReason::CsrfError => ApiError::new(
                ErrorCode::TokenFetch,
                "Your security token could not be refreshed. Please log in again.",
            )
            .with_status(419),
        },
        RequestError::Cancelled { reason } => ApiError::new(ErrorCode::Cancelled, reason.clone()),
    };

    tracing::warn!(
        code = %api_error.code,
        status = ?api_error.status,
        message = %api_error.message,
        "Request failed"
    );
    api_error
}
