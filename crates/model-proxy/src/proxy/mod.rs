//! Interface proxying.
//!
//! # Module Structure
//!
//! - `registry` - ProxyRegistry, the executor cache bound to a profile store
//! - `executor` - ProxyExecutor, one call over HTTP or from a mock rule
//! - `client` - HTTP client creation and configuration
//! - `params` - Call parameters and their form encoding
//! - `decode` - Response body decoding and classification

mod client;
mod decode;
mod executor;
mod params;
mod registry;

pub use client::{create_http_client, HttpClient, SharedPool};
pub use decode::{decode_body, Payload};
pub use executor::ProxyExecutor;
pub use params::Params;
pub use registry::{ProxyRegistry, ProxyRegistryBuilder};
