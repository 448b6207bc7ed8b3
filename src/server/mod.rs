//! HTTP server implementation for tinyhttp-rs.
//!
//! This module provides the route registry, the response encoder and a server that
//! runs one task per connection on top of the tinyhttp-rs decoder.

mod config;
mod error;
mod handler;
mod http_server;
mod response;
mod tests;

// Re-export public items
pub use config::ServerConfig;
pub use error::Error;
pub use handler::{HandlerFn, Pattern, Route, RouteMatch, Router};
pub use http_server::HttpServer;
pub use response::{write_response, HttpResponse, StatusCode};
