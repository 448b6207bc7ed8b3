//! Error types for the HTTP server.

use std::time::Duration;

use thiserror::Error;

use crate::parser::{Error as ParserError, Method};

/// Errors that can occur during route registration and HTTP server operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Error decoding an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A registration pattern was empty.
    #[error("Empty route pattern")]
    EmptyPattern,

    /// A registration pattern is not `<path>` or `<METHOD> <path>`.
    #[error("Invalid route pattern: {0:?}")]
    InvalidPattern(String),

    /// A registration pattern names a method that cannot be routed.
    #[error("Unsupported method in route pattern: {0:?}")]
    UnsupportedMethod(String),

    /// The method is already registered for the path.
    #[error("Method {method} is already registered for path: {path}")]
    DuplicateRoute { method: Method, path: String },

    /// A status code outside [100, 999].
    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),

    /// A handler panicked while serving a request.
    #[error("Handler panicked: {0}")]
    HandlerPanic(String),

    /// Reading the request or writing the response took too long.
    #[error("Timed out after {duration:?} while {operation}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
