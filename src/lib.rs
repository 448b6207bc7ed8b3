//! A tiny HTTP/1.1 server.
//!
//! This library reads requests straight off a byte stream, routes them by exact path
//! and method, and writes framed HTTP/1.1 responses, without a web framework in
//! between.
//!
//! # Features
//!
//! - Request decoding with multi-valued headers and `Content-Length` or chunked bodies
//! - Route registration with `"<path>"` or `"<METHOD> <path>"` patterns
//! - Responses encoded with a computed `Content-Length`
//! - One task per connection; a failing handler gets a 500 without affecting others
//! - Connection limits, read/write deadlines and graceful shutdown
//!
//! # Examples
//!
//! ## Decoding a request
//!
//! ```
//! use tinyhttp_rs::parse_request;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tinyhttp_rs::ParserError> {
//! let bytes = b"POST /users?role=admin HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
//!
//! let mut request = parse_request(bytes).await?;
//! assert_eq!(request.method, "POST");
//! assert_eq!(request.path(), "/users");
//! assert_eq!(request.get_query_param("role").as_deref(), Some("admin"));
//! assert_eq!(request.body.read_all(), b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Encoding a response
//!
//! ```
//! use std::io::Write;
//! use tinyhttp_rs::HttpResponse;
//!
//! let mut response = HttpResponse::new();
//! write!(response, "ok").unwrap();
//!
//! assert_eq!(response.encode(), b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
//! ```
//!
//! ## Serving
//!
//! ```no_run
//! use std::io::Write;
//! use tinyhttp_rs::{HttpServer, ServerConfig, ServerError};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ServerError> {
//! let server = HttpServer::new(ServerConfig::default());
//!
//! server.handle_func("GET /hello", |res, _req| {
//!     writeln!(res, "hello world")?;
//!     Ok(())
//! }).await?;
//!
//! server.serve("127.0.0.1:8888").await
//! # }
//! ```
//!
//! See the `demos` directory for a complete server.

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use parser::{parse_request, read_request, Body, Error as ParserError, Headers, HttpRequest, Method};
pub use server::{Error as ServerError, HttpResponse, HttpServer, Router, ServerConfig, StatusCode};
