//! Shared helpers for integration tests: a local upstream server and
//! catalog builders.

#![allow(dead_code)]

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use model_proxy::config::CatalogConfig;
use model_proxy::{CallLogger, CallRecord, InterfaceCatalog};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;

/// Start an upstream on an ephemeral port.
///
/// Routes:
/// - `/json` - `{"ok": true}`
/// - `/html` - an HTML error page
/// - `/impure` - JSON followed by an HTML document
/// - `/bad` - unparsable JSON
/// - `/text` - plain text
/// - `/raw` - non UTF-8 bytes
/// - `/delay?ms=N` - `{"delay": N}` after N milliseconds
/// - `/slow` - answers after two seconds
/// - `/echo` - describes the request it received
pub async fn start_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let _ = http1::Builder::new()
                    .serve_connection(io, service_fn(handle))
                    .await;
            });
        }
    });

    addr
}

/// An address nothing listens on
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn handle(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let response = match path.as_str() {
        "/json" => json_response(json!({"ok": true})),
        "/html" => text_response("<html><body>502 Bad Gateway</body></html>"),
        "/impure" => text_response(r#"{"a": 1}<!DOCTYPE html><html>oops</html>"#),
        "/bad" => text_response("{not json"),
        "/text" => text_response("plain text"),
        "/raw" => Response::new(Full::new(Bytes::from_static(&[0, 159, 146, 150]))),
        "/delay" => {
            let ms: u64 = query
                .strip_prefix("ms=")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            json_response(json!({"delay": ms}))
        }
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            json_response(json!({"late": true}))
        }
        "/echo" => {
            let method = req.method().to_string();
            let header = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let cookie = header("cookie");
            let content_type = header("content-type");
            let content_length = header("content-length");

            let body = req
                .into_body()
                .collect()
                .await
                .map(|b| b.to_bytes())
                .unwrap_or_default();

            json_response(json!({
                "method": method,
                "query": query,
                "body": String::from_utf8_lossy(&body),
                "cookie": cookie,
                "contentType": content_type,
                "contentLength": content_length,
            }))
        }
        _ => {
            let mut response = text_response("not found");
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    };

    Ok(response)
}

fn json_response(value: Value) -> Response<Full<Bytes>> {
    Response::builder()
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap()
}

fn text_response(text: &'static str) -> Response<Full<Bytes>> {
    Response::new(Full::new(Bytes::from_static(text.as_bytes())))
}

/// Interface entry pointing at `path` on the upstream, merged with `extra`
pub fn interface(id: &str, addr: SocketAddr, path: &str, extra: Value) -> Value {
    let mut entry = json!({
        "id": id,
        "urls": {"dev": format!("http://{addr}{path}")},
    });
    if let (Some(entry), Value::Object(extra)) = (entry.as_object_mut(), extra) {
        entry.extend(extra);
    }
    entry
}

/// Catalog in `dev` status rooted at `dir`
pub fn catalog(interfaces: Vec<Value>, dir: &Path) -> InterfaceCatalog {
    let config: CatalogConfig = serde_json::from_value(json!({
        "status": "dev",
        "interfaces": interfaces,
    }))
    .unwrap();
    InterfaceCatalog::from_config(config, dir).unwrap()
}

/// Write a mock rule under the default rulebase of `dir`
pub fn write_rule(dir: &Path, id: &str, rule: Value) {
    let rules = dir.join("interfaceRules");
    std::fs::create_dir_all(&rules).unwrap();
    std::fs::write(rules.join(format!("{id}.rule.json")), rule.to_string()).unwrap();
}

/// Keeps every call record it receives
#[derive(Default)]
pub struct CollectingLogger {
    records: Mutex<Vec<CallRecord>>,
}

impl CollectingLogger {
    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().clone()
    }

    pub fn for_id(&self, id: &str) -> Vec<CallRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.id == id)
            .cloned()
            .collect()
    }
}

impl CallLogger for CollectingLogger {
    fn log(&self, record: &CallRecord) {
        self.records.lock().push(record.clone());
    }
}
