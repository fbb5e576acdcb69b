//! Connection runtime for the SOCKS5 proxy.
//!
//! `socks5-proto` supplies the wire-level parsers; this crate supplies
//! everything that drives them over real sockets: the per-connection state
//! aggregate and pool (spec.md §3, §4.7), the flow controller (§4.6), the
//! copy engine (§4.10), the DNS resolver adapter (§4.8), metrics (§4.9),
//! and configuration.

mod connection;
mod copy;
mod flow;
mod listener;
mod pool;
mod resolver;
mod state_machine;

pub mod config;
pub mod metrics;

pub use connection::ConnectionState;
pub use config::ServerConfig;
pub use listener::run_listener;
pub use metrics::Metrics;
pub use pool::ConnectionPool;

use std::sync::Arc;

/// Shared, immutable-after-startup context handed to every connection task.
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub metrics: Arc<Metrics>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
        })
    }
}
