//! Per-interface call execution.
//!
//! A `ProxyExecutor` is built once per interface id. In `mock`/`mockerr`
//! status it answers from the interface's mock rule; otherwise it sends an
//! HTTP request through the shared pool, bounded by the profile's timeout,
//! and decodes the buffered response.

use super::client::SharedPool;
use super::decode::{decode_body, Payload};
use super::params::Params;
use crate::config::{MockMode, Profile};
use crate::error::{CallError, ProxyError};
use crate::log::{CallLogger, CallRecord, ResponseCode};
use crate::metrics;
use crate::mock::MockGenerator;
use crate::store::{MockRule, ProfileStore};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use hyper::{Method, Request, Uri};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Collaborators every executor of a registry shares.
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub store: Arc<dyn ProfileStore>,
    pub generator: Arc<dyn MockGenerator>,
    pub logger: Arc<dyn CallLogger>,
}

enum Route {
    Mock(MockMode),
    Network { url: String, pool: Arc<SharedPool> },
}

pub struct ProxyExecutor {
    profile: Arc<Profile>,
    method: Method,
    route: Route,
    rule: OnceCell<Arc<MockRule>>,
    deps: Collaborators,
}

impl ProxyExecutor {
    /// Build an executor. `pool` is only invoked for network profiles.
    pub(crate) fn new<F>(
        profile: Arc<Profile>,
        deps: Collaborators,
        pool: F,
    ) -> Result<Self, ProxyError>
    where
        F: FnOnce() -> Arc<SharedPool>,
    {
        let method =
            Method::from_bytes(profile.method.as_bytes()).map_err(|_| ProxyError::InvalidMethod {
                id: profile.id.clone(),
                method: profile.method.clone(),
            })?;

        let route = match profile.mock_mode() {
            Some(mode) => Route::Mock(mode),
            None => {
                let url = profile
                    .active_url()
                    .ok_or_else(|| ProxyError::MissingEnvironmentUrl {
                        id: profile.id.clone(),
                        status: profile.status.clone(),
                    })?;
                validate_url(&profile.id, url)?;
                Route::Network {
                    url: url.to_string(),
                    pool: pool(),
                }
            }
        };

        Ok(Self {
            profile,
            method,
            route,
            rule: OnceCell::new(),
            deps,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.route, Route::Mock(_))
    }

    /// Base URL of a network executor
    pub fn target_url(&self) -> Option<&str> {
        match &self.route {
            Route::Network { url, .. } => Some(url),
            Route::Mock(_) => None,
        }
    }

    /// Run one call. Every failure is returned as a `CallError`.
    pub async fn execute(&self, params: &Params, cookie: Option<&str>) -> Result<Payload, CallError> {
        match &self.route {
            Route::Mock(mode) => self.execute_mock(*mode),
            Route::Network { url, pool } => self.execute_network(url, pool, params, cookie).await,
        }
    }

    fn execute_mock(&self, mode: MockMode) -> Result<Payload, CallError> {
        let rule = self.load_rule()?;
        let template = match mode {
            MockMode::Response => &rule.response,
            MockMode::ResponseError => &rule.response_error,
        };

        let outcome = if self.profile.is_rule_static {
            Ok(template.clone())
        } else {
            self.deps
                .generator
                .generate(template)
                .map_err(|source| CallError::MockGeneration {
                    id: self.profile.id.clone(),
                    source,
                })
        };

        let label = match mode {
            MockMode::Response => "mock",
            MockMode::ResponseError => "mock_error",
        };
        metrics::record_call(&self.profile.id, label);

        outcome.map(Payload::Json)
    }

    /// Load the mock rule, caching it after the first success
    fn load_rule(&self) -> Result<Arc<MockRule>, CallError> {
        self.rule
            .get_or_try_init(|| self.deps.store.rule(&self.profile.id).map(Arc::new))
            .map(Arc::clone)
            .map_err(|source| CallError::MockLoad {
                id: self.profile.id.clone(),
                source,
            })
    }

    async fn execute_network(
        &self,
        base_url: &str,
        pool: &SharedPool,
        params: &Params,
        cookie: Option<&str>,
    ) -> Result<Payload, CallError> {
        let id = &self.profile.id;
        let encoded = params.encode();
        let is_post = self.method == Method::POST;

        // only GET carries the params in the query string
        let url = if self.method != Method::GET || encoded.is_empty() {
            base_url.to_string()
        } else {
            let separator = if base_url.contains('?') { '&' } else { '?' };
            format!("{base_url}{separator}{encoded}")
        };

        let cookie = cookie.filter(|c| !c.is_empty());
        if self.profile.is_cookie_needed && cookie.is_none() {
            debug!("Interface [{}] expects a cookie but none was provided", id);
        }

        debug!("Dispatching {} {} for interface [{}]", self.method, url, id);

        let start = Instant::now();
        let exchange = async {
            let _slot = pool.acquire().await.map_err(|e| e.to_string())?;
            let request = self
                .build_request(&url, is_post, &encoded, cookie)
                .map_err(|e| error_chain(&e))?;
            let response = pool
                .client()
                .request(request)
                .await
                .map_err(|e| error_chain(&e))?;
            let status = response.status().as_u16();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| error_chain(&e))?
                .to_bytes();
            Ok::<_, String>((status, body))
        };

        let outcome = tokio::time::timeout(self.profile.timeout(), exchange).await;
        let duration = start.elapsed();
        metrics::record_call_duration(id, duration.as_secs_f64() * 1000.0);

        let record = |res_code: ResponseCode, status: Option<u16>, data: String| CallRecord {
            id: id.clone(),
            url: url.clone(),
            params: params.to_value(),
            cookie: cookie.map(str::to_string),
            duration,
            res_code,
            status,
            data,
        };

        match outcome {
            Err(_elapsed) => {
                metrics::record_timeout(id);
                self.settle(record(
                    ResponseCode::NetworkFailure,
                    None,
                    format!("request aborted after {}ms", self.profile.timeout_ms),
                ));
                Err(CallError::Timeout {
                    id: id.clone(),
                    timeout_ms: self.profile.timeout_ms,
                })
            }
            Ok(Err(message)) => {
                self.settle(record(ResponseCode::NetworkFailure, None, message.clone()));
                Err(CallError::Network {
                    id: id.clone(),
                    message,
                })
            }
            Ok(Ok((status, body))) => {
                let (result, res_code) = decode_body(&self.profile, &body);
                self.settle(record(
                    res_code,
                    Some(status),
                    String::from_utf8_lossy(&body).into_owned(),
                ));
                result
            }
        }
    }

    fn build_request(
        &self,
        url: &str,
        is_post: bool,
        encoded: &str,
        cookie: Option<&str>,
    ) -> Result<Request<Full<Bytes>>, hyper::http::Error> {
        let mut builder = Request::builder().method(self.method.clone()).uri(url);

        let body = if is_post {
            builder = builder
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .header(CONTENT_LENGTH, encoded.len());
            Bytes::from(encoded.to_string())
        } else {
            builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
            Bytes::new()
        };

        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }

        builder.body(Full::new(body))
    }

    fn settle(&self, record: CallRecord) {
        metrics::record_call(&record.id, record.res_code.as_str());
        self.deps.logger.log(&record);
    }

    pub fn timeout(&self) -> Duration {
        self.profile.timeout()
    }
}

impl fmt::Debug for ProxyExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyExecutor")
            .field("id", &self.profile.id)
            .field("status", &self.profile.status)
            .field("method", &self.method)
            .field("target", &self.target_url())
            .finish()
    }
}

fn validate_url(id: &str, url: &str) -> Result<(), ProxyError> {
    let invalid = |reason: String| ProxyError::InvalidUrl {
        id: id.to_string(),
        url: url.to_string(),
        reason,
    };

    let uri: Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| invalid(e.to_string()))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(invalid("url must be absolute".to_string()));
    }
    Ok(())
}

/// Render an error with its source chain
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
