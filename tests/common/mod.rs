//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use storefront_client::{ApiClient, ClientConfig};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral loopback port.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Test configuration pointing at `addr`, with short backoff.
pub fn config_for(addr: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = format!("http://{}/api", addr);
    config.api.no_proxy = true;
    config.api.request_timeout_secs = 5;
    config.retries.backoff_base_ms = 100;
    config
}

pub fn client_for(addr: SocketAddr) -> ApiClient {
    ApiClient::new(config_for(addr)).unwrap()
}

/// Counts CSRF fetches and hands out `token-1`, `token-2`, ...
#[derive(Clone, Default)]
pub struct CsrfIssuer {
    pub fetches: Arc<AtomicU32>,
}

impl CsrfIssuer {
    pub fn count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Current token the backend expects.
    pub fn current(&self) -> String {
        format!("token-{}", self.count())
    }

    /// Route serving `/sanctum/csrf-cookie`. `delay` widens the window in
    /// which concurrent callers could race.
    pub fn route(&self, delay: Duration) -> Router {
        let fetches = self.fetches.clone();
        Router::new().route(
            "/sanctum/csrf-cookie",
            get(move || {
                let fetches = fetches.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    let n = fetches.fetch_add(1, Ordering::SeqCst) + 1;
                    (
                        StatusCode::NO_CONTENT,
                        [(
                            header::SET_COOKIE,
                            format!("XSRF-TOKEN=token-{}; Path=/; SameSite=Lax", n),
                        )],
                    )
                        .into_response()
                }
            }),
        )
    }
}

/// Count calls to a handler.
#[derive(Clone, Default)]
pub struct Calls(pub Arc<AtomicU32>);

impl Calls {
    /// Increment and return the previous count.
    pub fn hit(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}
