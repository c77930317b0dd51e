//! HTTP client subsystem.
//!
//! # Request Flow
//! ```text
//! get/post/put/patch/delete/upload
//!     → request.rs (immutable description of the call)
//!     → api.rs attempt loop:
//!         non-GET, same-origin → csrf::ensure_token() → X-XSRF-TOKEN
//!         bearer token, request ID, content type
//!         → transport
//!         → 2xx: response.rs unwraps {data}
//!         → error: resilience::RetryPolicy decides
//!             redirect (401 / second 419) → navigation::Navigator
//!             refresh CSRF (419) → resubmit once
//!             back off (503/504) → resubmit
//!             fail → error.rs ApiError
//! ```
//!
//! # Guarantees
//! - Callers get the unwrapped payload or a [`RequestError`], never a raw
//!   transport error
//! - Retries of one request are sequential and bounded
//! - Cancelling a request leaves shared state untouched

pub mod api;
pub mod cancel;
pub mod error;
pub mod request;
pub mod response;
pub mod upload;

pub use api::{ApiClient, BuildError};
pub use cancel::CancelToken;
pub use error::{handle_error, ApiError, ErrorCode, FieldErrors, RequestError, RequestResult};
pub use request::{Request, RequestBody, RequestOptions};
pub use upload::{Upload, UploadProgress};

pub use reqwest::Method;
