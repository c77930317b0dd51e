//! Anti-forgery token subsystem.
//!
//! # Data Flow
//! ```text
//! first mutating request
//!     → manager.rs ensure_token() (cache hit: no I/O)
//!     → miss: single-flight GET to the CSRF endpoint
//!     → cookies.rs stores Set-Cookie, token read from the cookie
//!     → token cached until a 419 invalidates it
//! ```

pub mod cookies;
pub mod manager;

pub use cookies::CookieJar;
pub use manager::CsrfTokenManager;
