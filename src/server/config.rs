//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address `start` binds to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections; extra ones get a 503.
    pub max_connections: usize,
    /// The read buffer size of each connection.
    pub read_buffer_size: usize,
    /// The largest accepted request body, in bytes.
    pub max_body_size: usize,
    /// Deadline for receiving a complete request.
    pub read_timeout: Duration,
    /// Deadline for sending the response.
    pub write_timeout: Duration,
    /// How long shutdown waits for in-flight connections.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_body_size: 8 * 1024 * 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
