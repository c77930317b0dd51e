//! Login, logout and the current user.
//!
//! # Lifecycle
//! ```text
//! login()  → POST login endpoint → {data: {token, user}} → SessionStore
//! startup  → SessionStore::open() restores token + user
//! logout() → POST logout endpoint (best effort) → SessionStore::clear()
//! 401      → client clears the session and redirects
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{ApiClient, ApiError, ErrorCode, RequestResult};
use crate::session::SessionError;

/// Login form payload.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub remember: bool,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    token: String,
    #[serde(default)]
    user: Value,
}

fn storage_error(e: SessionError) -> ApiError {
    ApiError::new(ErrorCode::Unknown, format!("Failed to persist session: {}", e)).with_source(e)
}

impl ApiClient {
    /// Authenticate and persist the session. Returns the user profile.
    pub async fn login(&self, credentials: &Credentials) -> RequestResult<Value> {
        let endpoint = self.config().auth.login_endpoint.clone();
        let payload: LoginPayload = self.post(&endpoint, credentials).await?;

        self.session().set_token(&payload.token).map_err(storage_error)?;
        self.session().set_user(payload.user.clone()).map_err(storage_error)?;

        tracing::info!(email = %credentials.email, "Logged in");
        Ok(payload.user)
    }

    /// End the session. The local session is cleared even if the backend
    /// call fails.
    pub async fn logout(&self) -> RequestResult<()> {
        if self.is_authenticated() {
            let endpoint = self.config().auth.logout_endpoint.clone();
            if let Err(e) = self.post::<Value, _>(&endpoint, &json!({})).await {
                tracing::debug!(error = %e, "Logout request failed, clearing session anyway");
            }
        }

        self.session().clear().map_err(storage_error)?;
        self.csrf().invalidate();
        tracing::info!("Logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().token().is_some()
    }

    /// Profile stored at login, without I/O.
    pub fn current_user(&self) -> Option<Value> {
        self.session().user()
    }

    /// Fetch the profile from the backend and store it.
    pub async fn refresh_user(&self) -> RequestResult<Value> {
        let endpoint = self.config().auth.me_endpoint.clone();
        let user: Value = self.get(&endpoint).await?;
        self.session().set_user(user.clone()).map_err(storage_error)?;
        Ok(user)
    }
}
