//! Connection pool configuration.

use serde::{Deserialize, Serialize};

/// Limits for the keep-alive pool shared by every executor of a registry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPoolConfig {
    /// Maximum number of requests in flight at once
    #[serde(default = "default_max_active")]
    pub max_active: usize,

    /// Idle sockets kept per upstream host
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// How long an idle socket stays in the pool
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Upper bound for establishing a socket
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_secs: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_active: default_max_active(),
            max_idle_per_host: default_max_idle_per_host(),
            idle_timeout_secs: default_idle_timeout(),
            socket_timeout_secs: default_socket_timeout(),
        }
    }
}

fn default_max_active() -> usize {
    100
}

fn default_max_idle_per_host() -> usize {
    10
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_socket_timeout() -> u64 {
    60
}
