//! Login and logout against a mock backend.

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use serde_json::{json, Value};
use storefront_client::{ApiClient, Credentials, ErrorCode};

mod common;
use common::{Calls, CsrfIssuer};

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn auth_router(issuer: &CsrfIssuer, logouts: Calls) -> axum::Router {
    issuer
        .route(Duration::ZERO)
        .route(
            "/api/auth/login",
            post(|Json(body): Json<Value>| async move {
                if body["password"] == "correct horse" {
                    Json(json!({
                        "data": {
                            "token": "tok-42",
                            "user": {"id": 1, "email": body["email"], "role": "admin"}
                        },
                        "message": "Logged in"
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(json!({
                            "message": "These credentials do not match our records.",
                            "errors": {"email": ["These credentials do not match our records."]}
                        })),
                    )
                        .into_response()
                }
            }),
        )
        .route(
            "/api/auth/me",
            get(|headers: HeaderMap| async move {
                match bearer(&headers).as_deref() {
                    Some("Bearer tok-42") => Json(json!({"data": {"id": 1, "name": "Ops"}})).into_response(),
                    _ => StatusCode::UNAUTHORIZED.into_response(),
                }
            }),
        )
        .route(
            "/api/auth/logout",
            post(move || {
                let logouts = logouts.clone();
                async move {
                    logouts.hit();
                    StatusCode::NO_CONTENT
                }
            }),
        )
}

#[tokio::test]
async fn test_login_persists_session_and_sends_bearer() {
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");

    let issuer = CsrfIssuer::default();
    let addr = common::start_backend(auth_router(&issuer, Calls::default())).await;
    let mut config = common::config_for(addr);
    config.auth.session_file = Some(session_file.to_string_lossy().into_owned());
    let client = ApiClient::new(config.clone()).unwrap();

    let user = client
        .login(&Credentials::new("ops@example.com", "correct horse"))
        .await
        .unwrap();
    assert_eq!(user["email"], "ops@example.com");
    assert!(client.is_authenticated());
    assert!(session_file.exists());

    let me: Value = client.refresh_user().await.unwrap();
    assert_eq!(me["name"], "Ops");

    // A fresh client picks the session up from disk.
    let restored = ApiClient::new(config).unwrap();
    assert_eq!(restored.session().token().as_deref(), Some("tok-42"));
    assert_eq!(restored.current_user().unwrap()["name"], "Ops");
}

#[tokio::test]
async fn test_login_rejected_leaves_session_empty() {
    let issuer = CsrfIssuer::default();
    let addr = common::start_backend(auth_router(&issuer, Calls::default())).await;
    let client = common::client_for(addr);

    let err = client
        .login(&Credentials::new("ops@example.com", "wrong"))
        .await
        .unwrap_err();
    let api_error = err.as_api_error().unwrap();
    assert_eq!(api_error.status, Some(422));
    assert_eq!(api_error.code, ErrorCode::Unknown);
    assert!(api_error.errors.contains_key("email"));
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_session_and_csrf() {
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");

    let issuer = CsrfIssuer::default();
    let logouts = Calls::default();
    let addr = common::start_backend(auth_router(&issuer, logouts.clone())).await;
    let mut config = common::config_for(addr);
    config.auth.session_file = Some(session_file.to_string_lossy().into_owned());
    let client = ApiClient::new(config).unwrap();

    client
        .login(&Credentials::new("ops@example.com", "correct horse"))
        .await
        .unwrap();
    client.logout().await.unwrap();

    assert_eq!(logouts.count(), 1);
    assert!(!client.is_authenticated());
    assert!(client.current_user().is_none());
    assert!(client.csrf().token().is_none());
    assert!(!session_file.exists());
}

#[tokio::test]
async fn test_expired_session_is_cleared_on_unauthorized() {
    let issuer = CsrfIssuer::default();
    let addr = common::start_backend(auth_router(&issuer, Calls::default())).await;
    let client = common::client_for(addr);
    client.session().set_token("revoked").unwrap();

    let err = client.refresh_user().await.unwrap_err();
    assert!(err.is_redirect());
    assert!(!client.is_authenticated());
}
