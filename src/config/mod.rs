//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (STOREFRONT_API_URL)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → shared via Arc by the client
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    ApiConfig, AuthConfig, ClientConfig, CsrfConfig, LogFormat, ObservabilityConfig, RetryConfig,
};
pub use validation::ValidationError;
