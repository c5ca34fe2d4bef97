//! RequestAggregator - batches interface calls and joins their results.
//!
//! An aggregator binds method names to interface executors at creation.
//! `invoke` queues calls; `done` dispatches the whole queue concurrently and
//! returns one result per call in the order the calls were queued.

use crate::error::{AggregatorError, CallError};
use crate::metrics;
use crate::proxy::{Params, Payload, ProxyExecutor, ProxyRegistry};
use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error};

/// Result of one queued call
pub type CallResult = Result<Payload, CallError>;

/// Handler invoked once for every failed call of a batch
pub type FailureHandler = Arc<dyn Fn(&CallError) + Send + Sync>;

static PATTERN_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_pattern_regex() -> &'static Regex {
    PATTERN_REGEX.get_or_init(|| Regex::new(r"^(?:\w+\.)+\*").unwrap())
}

/// Which interfaces an aggregator binds, and under which method names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSpec {
    /// Ids bound under their final dotted segment
    Ids(Vec<String>),
    /// Every id starting with this prefix
    Pattern(String),
    /// Explicit method name to id pairs
    Methods(Vec<(String, String)>),
}

impl InterfaceSpec {
    pub fn methods<I, M, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (M, S)>,
        M: Into<String>,
        S: Into<String>,
    {
        InterfaceSpec::Methods(
            pairs
                .into_iter()
                .map(|(method, id)| (method.into(), id.into()))
                .collect(),
        )
    }

    fn bindings(self, registry: &ProxyRegistry) -> Result<Vec<(String, String)>, AggregatorError> {
        let ids = match self {
            InterfaceSpec::Methods(pairs) => return Ok(pairs),
            InterfaceSpec::Ids(ids) => ids,
            InterfaceSpec::Pattern(prefix) => registry.ids_with_prefix(&prefix)?,
        };
        Ok(ids
            .into_iter()
            .map(|id| (method_name(&id).to_string(), id))
            .collect())
    }
}

impl From<&str> for InterfaceSpec {
    /// `Api.*` selects by prefix; anything else is a single id
    fn from(spec: &str) -> Self {
        match get_pattern_regex().find(spec) {
            Some(m) => InterfaceSpec::Pattern(spec[..m.end() - 1].to_string()),
            None => InterfaceSpec::Ids(vec![spec.to_string()]),
        }
    }
}

impl From<String> for InterfaceSpec {
    fn from(spec: String) -> Self {
        InterfaceSpec::from(spec.as_str())
    }
}

impl From<Vec<&str>> for InterfaceSpec {
    fn from(ids: Vec<&str>) -> Self {
        InterfaceSpec::Ids(ids.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for InterfaceSpec {
    fn from(ids: Vec<String>) -> Self {
        InterfaceSpec::Ids(ids)
    }
}

/// Method name for an id: its final dotted segment
pub fn method_name(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

struct QueuedCall {
    params: Params,
    executor: Arc<ProxyExecutor>,
}

pub struct RequestAggregator {
    methods: HashMap<String, Arc<ProxyExecutor>>,
    queue: Vec<QueuedCall>,
    cookie: Option<String>,
    on_fail: Option<FailureHandler>,
}

impl RequestAggregator {
    /// Bind the interfaces named by `spec`. Every id is resolved here, so
    /// unknown ids and misconfigured interfaces fail immediately.
    pub fn create(
        registry: &ProxyRegistry,
        spec: impl Into<InterfaceSpec>,
    ) -> Result<Self, AggregatorError> {
        let mut methods = HashMap::new();
        for (method, id) in spec.into().bindings(registry)? {
            let executor = registry.resolve(&id)?;
            // Later bindings replace earlier ones
            methods.insert(method, executor);
        }

        debug!("Aggregator created with {} method(s)", methods.len());
        Ok(Self {
            methods,
            queue: Vec::new(),
            cookie: None,
            on_fail: None,
        })
    }

    /// Bound method names, sorted
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of queued calls
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue a call to `method`.
    pub fn invoke(
        &mut self,
        method: &str,
        params: impl Into<Params>,
    ) -> Result<&mut Self, AggregatorError> {
        let executor = self
            .methods
            .get(method)
            .ok_or_else(|| AggregatorError::UnknownMethod(method.to_string()))?;
        self.queue.push(QueuedCall {
            params: params.into(),
            executor: Arc::clone(executor),
        });
        Ok(self)
    }

    /// Cookie sent with every call of the next drain only
    pub fn with_cookie(&mut self, cookie: impl Into<String>) -> &mut Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Register the fallback failure handler
    pub fn error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&CallError) + Send + Sync + 'static,
    {
        self.on_fail = Some(Arc::new(handler));
        self
    }

    /// Dispatch every queued call and wait for all of them.
    ///
    /// The result has one entry per queued call, in queue order. Each failure
    /// is also passed to the registered handler, or logged at error level
    /// when there is none.
    pub async fn done(&mut self) -> Vec<CallResult> {
        self.drain(None::<fn(&CallError)>).await
    }

    /// Like `done`, with `on_fail` taking precedence over the registered
    /// handler for this drain.
    pub async fn done_with<F>(&mut self, on_fail: F) -> Vec<CallResult>
    where
        F: Fn(&CallError),
    {
        self.drain(Some(on_fail)).await
    }

    async fn drain<F>(&mut self, on_fail: Option<F>) -> Vec<CallResult>
    where
        F: Fn(&CallError),
    {
        let queue = std::mem::take(&mut self.queue);
        let cookie = self.cookie.take();

        if queue.is_empty() {
            metrics::record_batch(0, 0);
            return Vec::new();
        }

        let total = queue.len();
        debug!("Draining {} queued call(s)", total);

        let mut slots: Vec<Option<CallResult>> = (0..total).map(|_| None).collect();
        let mut pending: FuturesUnordered<_> = queue
            .iter()
            .enumerate()
            .map(|(index, call)| {
                let cookie = cookie.as_deref();
                async move { (index, call.executor.execute(&call.params, cookie).await) }
            })
            .collect();

        let mut failed = 0;
        while let Some((index, result)) = pending.next().await {
            if let Err(err) = &result {
                failed += 1;
                match (&on_fail, &self.on_fail) {
                    (Some(handler), _) => handler(err),
                    (None, Some(handler)) => handler(err),
                    (None, None) => {
                        error!(
                            "Interface [{}] call failed, params: {}, error: {}",
                            err.interface_id(),
                            queue[index].params.to_value(),
                            err
                        );
                    }
                }
            }
            slots[index] = Some(result);
        }
        drop(pending);

        metrics::record_batch(total, failed);
        slots.into_iter().flatten().collect()
    }
}

impl fmt::Debug for RequestAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAggregator")
            .field("methods", &self.methods())
            .field("pending", &self.queue.len())
            .field("has_cookie", &self.cookie.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use crate::error::ProxyError;
    use crate::store::InterfaceCatalog;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::path::Path;
    use tracing_test::traced_test;

    /// Catalog in mock status with rules for `Api.list` and `Api.detail`;
    /// `Api.missing` has no rule file so every call to it fails.
    fn registry(dir: &Path) -> ProxyRegistry {
        let rules = dir.join("interfaceRules");
        std::fs::create_dir_all(&rules).unwrap();
        std::fs::write(
            rules.join("Api.list.rule.json"),
            r#"{"response": {"items": [1, 2]}, "responseError": {"code": 500}}"#,
        )
        .unwrap();
        std::fs::write(
            rules.join("Api.detail.rule.json"),
            r#"{"response": {"id": 7}, "responseError": {}}"#,
        )
        .unwrap();

        let config: CatalogConfig = serde_json::from_value(json!({
            "status": "mock",
            "interfaces": [
                {"id": "Api.list", "urls": {"dev": "http://127.0.0.1:9"}, "isRuleStatic": true},
                {"id": "Api.detail", "urls": {"dev": "http://127.0.0.1:9"}, "isRuleStatic": true},
                {"id": "Api.missing", "urls": {"dev": "http://127.0.0.1:9"}, "isRuleStatic": true},
                {"id": "Other.detail", "urls": {"dev": "http://127.0.0.1:9"}, "isRuleStatic": true}
            ]
        }))
        .unwrap();
        ProxyRegistry::from_catalog(InterfaceCatalog::from_config(config, dir).unwrap())
    }

    #[test]
    fn test_spec_parsing() {
        assert_eq!(
            InterfaceSpec::from("Api.*"),
            InterfaceSpec::Pattern("Api.".to_string())
        );
        assert_eq!(
            InterfaceSpec::from("Api.v2.*"),
            InterfaceSpec::Pattern("Api.v2.".to_string())
        );
        assert_eq!(
            InterfaceSpec::from("Api.list"),
            InterfaceSpec::Ids(vec!["Api.list".to_string()])
        );
        assert_eq!(
            InterfaceSpec::from(vec!["A.b", "C.d"]),
            InterfaceSpec::Ids(vec!["A.b".to_string(), "C.d".to_string()])
        );
        assert_eq!(method_name("Api.v2.list"), "list");
        assert_eq!(method_name("list"), "list");
    }

    #[test]
    fn test_create_binds_methods() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let single = RequestAggregator::create(&registry, "Api.list").unwrap();
        assert_eq!(single.methods(), vec!["list"]);

        let pattern = RequestAggregator::create(&registry, "Api.*").unwrap();
        assert_eq!(pattern.methods(), vec!["detail", "list", "missing"]);

        let explicit = RequestAggregator::create(
            &registry,
            InterfaceSpec::methods([("items", "Api.list"), ("one", "Api.detail")]),
        )
        .unwrap();
        assert_eq!(explicit.methods(), vec!["items", "one"]);
    }

    #[tokio::test]
    async fn test_later_duplicate_method_wins() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let mut agg =
            RequestAggregator::create(&registry, vec!["Api.detail", "Other.detail"]).unwrap();
        assert_eq!(agg.methods(), vec!["detail"]);

        agg.invoke("detail", ()).unwrap();
        let results = agg.done_with(|_| {}).await;
        // Other.detail has no rule file, so the call fails
        assert!(matches!(
            &results[0],
            Err(CallError::MockLoad { id, .. }) if id == "Other.detail"
        ));
    }

    #[test]
    fn test_create_propagates_resolution_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let err = RequestAggregator::create(&registry, "Api.unknown").unwrap_err();
        assert!(matches!(
            err,
            AggregatorError::Proxy(ProxyError::UnknownInterface(_))
        ));

        let unconfigured = ProxyRegistry::new();
        let err = RequestAggregator::create(&unconfigured, "Api.*").unwrap_err();
        assert!(matches!(err, AggregatorError::Proxy(ProxyError::NotConfigured)));
    }

    #[test]
    fn test_invoke_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let mut agg = RequestAggregator::create(&registry, "Api.list").unwrap();

        let err = agg.invoke("nope", ()).unwrap_err();
        assert!(matches!(err, AggregatorError::UnknownMethod(m) if m == "nope"));
        assert_eq!(agg.pending(), 0);
    }

    #[tokio::test]
    async fn test_empty_queue_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let mut agg = RequestAggregator::create(&registry, "Api.*").unwrap();

        let results = agg.done().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_results_in_queue_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let mut agg = RequestAggregator::create(&registry, "Api.*").unwrap();

        agg.invoke("detail", ())
            .unwrap()
            .invoke("missing", json!({"page": 1}))
            .unwrap()
            .invoke("list", ())
            .unwrap();
        assert_eq!(agg.pending(), 3);

        let failures = Mutex::new(Vec::new());
        let results = agg
            .done_with(|err| failures.lock().push(err.interface_id().to_string()))
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Payload::Json(json!({"id": 7}))
        );
        assert!(matches!(results[1], Err(CallError::MockLoad { .. })));
        assert_eq!(
            results[2].as_ref().unwrap(),
            &Payload::Json(json!({"items": [1, 2]}))
        );
        assert_eq!(*failures.lock(), vec!["Api.missing"]);
        assert_eq!(agg.pending(), 0);
    }

    #[tokio::test]
    async fn test_handler_called_once_per_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let mut agg = RequestAggregator::create(&registry, "Api.*").unwrap();

        let count = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&count);
        agg.error(move |_| *seen.lock() += 1);

        agg.invoke("missing", ()).unwrap();
        agg.invoke("list", ()).unwrap();
        agg.invoke("missing", ()).unwrap();
        let results = agg.done().await;

        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 2);
        assert_eq!(*count.lock(), 2);
    }

    #[tokio::test]
    async fn test_call_scoped_handler_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let mut agg = RequestAggregator::create(&registry, "Api.missing").unwrap();

        let fallback = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&fallback);
        agg.error(move |_| *seen.lock() += 1);

        let scoped = Mutex::new(0);
        agg.invoke("missing", ()).unwrap();
        agg.done_with(|_| *scoped.lock() += 1).await;

        assert_eq!(*scoped.lock(), 1);
        assert_eq!(*fallback.lock(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_default_handler_logs_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let mut agg = RequestAggregator::create(&registry, "Api.missing").unwrap();

        agg.invoke("missing", json!({"q": "shoes"})).unwrap();
        let results = agg.done().await;

        assert!(results[0].is_err());
        assert!(logs_contain("Interface [Api.missing] call failed"));
        assert!(logs_contain("shoes"));
    }

    #[tokio::test]
    async fn test_queue_reusable_after_drain() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let mut agg = RequestAggregator::create(&registry, "Api.*").unwrap();

        agg.with_cookie("sid=1");
        agg.invoke("list", ()).unwrap();
        assert_eq!(agg.done().await.len(), 1);
        assert!(agg.cookie.is_none());

        agg.invoke("detail", ()).unwrap();
        agg.invoke("detail", ()).unwrap();
        assert_eq!(agg.done().await.len(), 2);
    }
}
