//! Storefront admin API client library.
//!
//! # Architecture Overview
//!
//! ```text
//!   page code / CLI shell
//!          │  get · post · put · patch · delete · upload
//!          ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │ client::ApiClient                                    │
//!   │   request pipeline ──► csrf::CsrfTokenManager        │
//!   │   response pipeline ─► resilience::RetryPolicy       │
//!   │   errors ────────────► client::ApiError              │
//!   │   auth ──────────────► session::SessionStore         │
//!   └───────────────┬──────────────────────────────────────┘
//!                   │ Redirect events
//!                   ▼
//!   navigation::Navigator ──► shell performs the navigation
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod csrf;
pub mod navigation;
pub mod observability;
pub mod resilience;
pub mod session;

pub use auth::Credentials;
pub use client::{
    handle_error, ApiClient, ApiError, CancelToken, ErrorCode, Request, RequestError, Upload,
};
pub use config::ClientConfig;
pub use navigation::{Navigator, Redirect, RedirectReason};
