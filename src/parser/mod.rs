//! HTTP request decoding.
//!
//! This module turns a raw byte stream into an [`HttpRequest`]: request line,
//! multi-valued headers and a body framed by `Content-Length` or chunked
//! transfer-encoding.

mod body;
mod error;
mod framing;
mod headers;
mod method;
mod request;

// Re-export public items
pub use body::Body;
pub use error::Error;
pub use framing::{BodyFraming, MAX_LINE_LENGTH};
pub use headers::Headers;
pub use method::Method;
pub use request::HttpRequest;

// Re-export the decoding functions
pub use request::{body_framing, parse_request, read_request};
