//! Error types for the HTTP request decoder.

use thiserror::Error;

/// Errors that can occur while decoding an HTTP request from a byte stream.
///
/// Every variant is a protocol error: the connection that produced it is closed
/// without a response.
#[derive(Debug, Error)]
pub enum Error {
    /// The method token is not one of the supported methods.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request line does not split into exactly three tokens.
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The request target could not be parsed as a URI.
    #[error("Invalid request target {target:?}: {reason}")]
    InvalidUri { target: String, reason: String },

    /// A header line has no colon.
    #[error("Invalid header format: {0}")]
    InvalidHeaderFormat(String),

    /// The last `Content-Length` value is not a non-negative integer.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// A chunk of a chunked body is malformed.
    #[error("Invalid chunked body: {0}")]
    InvalidChunk(String),

    /// The body is larger than the configured limit.
    #[error("Request body exceeds the limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// A line of the request head is longer than the limit.
    #[error("Line exceeds the limit of {limit} bytes")]
    LineTooLong { limit: usize },

    /// The request head contains bytes that are not valid UTF-8.
    #[error("Request head is not valid UTF-8")]
    InvalidUtf8,

    /// The stream ended before the request was complete.
    #[error("Unexpected end of stream while reading {0}")]
    UnexpectedEof(&'static str),

    /// The connection closed before any byte was received.
    #[error("Empty request")]
    EmptyRequest,

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// The query string could not be decoded.
    #[error("Query string error: {0}")]
    QueryError(#[from] serde_urlencoded::de::Error),

    /// Error parsing JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
