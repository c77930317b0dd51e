//! Request descriptions.
//!
//! A [`Request`] is an immutable description of one logical call. The
//! client turns it into a fresh transport request for every attempt.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::client::cancel::CancelToken;
use crate::client::error::{ApiError, ErrorCode};
use crate::client::upload::Upload;

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Upload),
}

/// Caller-controlled extras.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub cancel: Option<CancelToken>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// `/`-prefixed path relative to the base URL, or an absolute URL.
    pub path: String,
    pub body: RequestBody,
    pub options: RequestOptions,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            options: RequestOptions::default(),
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| {
            ApiError::new(ErrorCode::Unknown, format!("Failed to serialize request body: {}", e))
                .with_source(e)
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn upload(mut self, upload: Upload) -> Self {
        self.body = RequestBody::Multipart(upload);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.options.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((key.into(), value.into()));
        self
    }

    pub fn cancel_with(mut self, token: &CancelToken) -> Self {
        self.options.cancel = Some(token.clone());
        self
    }

    /// Same-origin, state-changing requests carry a CSRF token.
    pub fn needs_csrf(&self) -> bool {
        self.method != Method::GET && self.path.starts_with('/')
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_needs_csrf() {
        assert!(!Request::new(Method::GET, "/products").needs_csrf());
        assert!(Request::new(Method::POST, "/products").needs_csrf());
        assert!(Request::new(Method::DELETE, "/products/3").needs_csrf());
        assert!(!Request::new(Method::POST, "https://cdn.example.com/hooks").needs_csrf());
        assert!(!Request::new(Method::PUT, "products").needs_csrf());
    }

    #[test]
    fn test_builder() {
        let token = CancelToken::new();
        let request = Request::new(Method::PATCH, "/orders/9")
            .json(&json!({"status": "shipped"}))
            .unwrap()
            .query("notify", "true")
            .cancel_with(&token);

        assert!(matches!(request.body, RequestBody::Json(ref v) if v["status"] == "shipped"));
        assert_eq!(request.options.query, vec![("notify".to_string(), "true".to_string())]);
        assert!(request.options.cancel.is_some());
        assert!(!request.is_multipart());
    }
}
