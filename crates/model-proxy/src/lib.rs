//! Backend-for-frontend request aggregation.
//!
//! Interfaces are declared in a catalog and called by id. A
//! `RequestAggregator` queues calls against several interfaces, dispatches
//! them concurrently and returns their results in call order. Interfaces in
//! `mock`/`mockerr` status answer from local mock rules instead of the
//! network.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod log;
pub mod metrics;
pub mod mock;
pub mod proxy;
pub mod store;

pub use aggregator::{CallResult, FailureHandler, InterfaceSpec, RequestAggregator};
pub use error::{AggregatorError, CallError, CatalogError, MockError, ProxyError};
pub use log::{CallLogger, CallRecord, NoopLogger, ResponseCode, TracingLogger};
pub use mock::{MockGenerator, TemplateEngine};
pub use proxy::{Params, Payload, ProxyExecutor, ProxyRegistry};
pub use store::{InterfaceCatalog, MockRule, ProfileStore};
