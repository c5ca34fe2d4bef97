//! model-proxy CLI
//!
//! Loads an interface catalog, calls the given interfaces as one batch and
//! prints the results as a JSON array in call order.
//!
//! Usage:
//!   model-proxy --catalog interfaces.json Api.list 'Api.detail={"id": 7}'

use anyhow::{Context, Result};
use clap::Parser;
use model_proxy::{
    metrics, CallLogger, InterfaceCatalog, InterfaceSpec, NoopLogger, Params, ProxyRegistry,
    RequestAggregator, TracingLogger,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Call catalog interfaces as one aggregated batch
#[derive(Parser, Debug)]
#[command(name = "model-proxy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface catalog file (JSON, or YAML by extension)
    #[arg(short, long, env = "MODEL_PROXY_CATALOG")]
    catalog: String,

    /// Cookie header sent with every call
    #[arg(long, env = "MODEL_PROXY_COOKIE")]
    cookie: Option<String>,

    /// Emit a log record for every network call
    #[arg(long)]
    log_calls: bool,

    /// Print Prometheus metrics to stderr when finished
    #[arg(long)]
    metrics: bool,

    /// Calls to make, as `ID` or `ID=<JSON params>`
    #[arg(required = true)]
    calls: Vec<String>,
}

/// Split `ID=<json>` into the id and its params
fn parse_call(call: &str) -> Result<(String, Params)> {
    match call.split_once('=') {
        Some((id, raw)) => {
            let value: Value = serde_json::from_str(raw)
                .with_context(|| format!("invalid JSON params for {id}"))?;
            Ok((id.to_string(), Params::from(value)))
        }
        None => Ok((call.to_string(), Params::None)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if args.log_calls {
        filter = filter.add_directive("model_proxy::calls=info".parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let calls = args
        .calls
        .iter()
        .map(|call| parse_call(call))
        .collect::<Result<Vec<_>>>()?;

    let catalog = InterfaceCatalog::from_file(&args.catalog)
        .with_context(|| format!("failed to load catalog {}", args.catalog))?;
    info!("Loaded {} interface(s) from {}", catalog.len(), args.catalog);

    let logger: Arc<dyn CallLogger> = if args.log_calls {
        Arc::new(TracingLogger)
    } else {
        Arc::new(NoopLogger)
    };
    let registry = ProxyRegistry::builder()
        .pool(catalog.config().connection_pool.clone())
        .logger(logger)
        .store(Arc::new(catalog))
        .build();

    // Bind each interface under its full id so calls map one to one
    let bindings = calls.iter().map(|(id, _)| (id.clone(), id.clone()));
    let mut aggregator = RequestAggregator::create(&registry, InterfaceSpec::methods(bindings))?;

    for (id, params) in calls {
        aggregator.invoke(&id, params)?;
    }
    if let Some(cookie) = args.cookie {
        aggregator.with_cookie(cookie);
    }

    let results = aggregator.done_with(|_| {}).await;
    let failed = results.iter().filter(|r| r.is_err()).count();

    let output: Vec<Value> = results
        .iter()
        .map(|result| match result {
            Ok(payload) => payload.to_json(),
            Err(e) => json!({ "error": e.to_string() }),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);

    if args.metrics {
        eprint!("{}", metrics::collect_metrics());
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
