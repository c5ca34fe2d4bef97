//! HTTP client creation and configuration.
//!
//! This module provides the keep-alive pool shared by every network
//! executor of a registry.

use crate::config::ConnectionPoolConfig;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};
use tracing::info;

/// Type alias for the HTTP client used by executors.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Shared client plus the limit on requests in flight.
pub struct SharedPool {
    client: HttpClient,
    active: Semaphore,
}

impl SharedPool {
    pub fn new(config: &ConnectionPoolConfig) -> Self {
        Self {
            client: create_http_client(config),
            active: Semaphore::new(config.max_active.max(1)),
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Wait for a free request slot
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, AcquireError> {
        self.active.acquire().await
    }

    pub fn available_slots(&self) -> usize {
        self.active.available_permits()
    }
}

/// Create an HTTP client with connection pooling.
///
/// Plain `http://` and `https://` upstreams are both supported; TLS uses the
/// bundled webpki roots.
pub fn create_http_client(config: &ConnectionPoolConfig) -> HttpClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(config.idle_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(config.socket_timeout_secs)));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let http_client = Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build(https_connector);

    info!(
        "Connection pool configured (HTTP/1.1): max_active={}, max_idle={}, idle_timeout={}s, socket_timeout={}s",
        config.max_active,
        config.max_idle_per_host,
        config.idle_timeout_secs,
        config.socket_timeout_secs
    );

    http_client
}
