//! Session persistence.
//!
//! The bearer token and user profile are written at login, read at startup
//! and removed at logout or when the backend reports the session expired.

pub mod store;

pub use store::{SessionError, SessionStore};
