//! HTTP response types and the response encoder.

use std::fmt;
use std::io;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::parser::Headers;
use crate::server::error::Error;

/// An HTTP status code in the range [100, 999].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const ACCEPTED: StatusCode = StatusCode(202);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const NOT_IMPLEMENTED: StatusCode = StatusCode(501);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// Validate a numeric status code.
    pub fn from_u16(code: u16) -> Result<Self, Error> {
        if (100..=999).contains(&code) {
            Ok(StatusCode(code))
        } else {
            Err(Error::InvalidStatus(code))
        }
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// The registered reason phrase, if the code has one.
    pub fn canonical_reason(&self) -> Option<&'static str> {
        let reason = match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            102 => "Processing",
            103 => "Early Hints",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            207 => "Multi-Status",
            208 => "Already Reported",
            226 => "IM Used",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            305 => "Use Proxy",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            412 => "Precondition Failed",
            413 => "Request Entity Too Large",
            414 => "Request URI Too Long",
            415 => "Unsupported Media Type",
            416 => "Requested Range Not Satisfiable",
            417 => "Expectation Failed",
            418 => "I'm a teapot",
            421 => "Misdirected Request",
            422 => "Unprocessable Entity",
            423 => "Locked",
            424 => "Failed Dependency",
            425 => "Too Early",
            426 => "Upgrade Required",
            428 => "Precondition Required",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            451 => "Unavailable For Legal Reasons",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            506 => "Variant Also Negotiates",
            507 => "Insufficient Storage",
            508 => "Loop Detected",
            510 => "Not Extended",
            511 => "Network Authentication Required",
            _ => return None,
        };
        Some(reason)
    }

    /// Get the reason phrase for this status code, `Unknown Status` if it has none.
    pub fn reason_phrase(&self) -> &'static str {
        self.canonical_reason().unwrap_or("Unknown Status")
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::OK
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// Represents an HTTP response under construction.
///
/// A handler receives a fresh response with status 200, no headers and an empty
/// body, and fills it in. The server computes `Content-Length` when encoding.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Create an empty `200 OK` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// A response with the given status and nothing else.
    pub fn bare(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the status code.
    ///
    /// # Panics
    ///
    /// Panics if `code` is outside [100, 999]. Inside a handler the panic is caught by
    /// the connection and answered with a 500.
    pub fn set_status(&mut self, code: u16) {
        if let Err(e) = self.try_set_status(code) {
            panic!("{e}");
        }
    }

    /// Set the status code, rejecting codes outside [100, 999].
    pub fn try_set_status(&mut self, code: u16) -> Result<(), Error> {
        self.status = StatusCode::from_u16(code)?;
        Ok(())
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append bytes to the body.
    pub fn write_body(&mut self, bytes: impl AsRef<[u8]>) {
        self.body.extend_from_slice(bytes.as_ref());
    }

    /// Replace the body with a JSON document and set the content type.
    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.body = serde_json::to_vec(value)?;
        self.headers.set("Content-Type", "application/json");
        Ok(())
    }

    /// Add a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.headers.set("Content-Type", content_type);
        self
    }

    /// Set the response body with a string.
    pub fn with_body_string(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Serialize the response into wire bytes.
    ///
    /// Sets `Content-Length` to the body length, replacing any value the handler put
    /// there, then emits the status line, one line per header value, a blank line and
    /// the body.
    pub fn encode(&mut self) -> Vec<u8> {
        self.headers.set("Content-Length", self.body.len().to_string());

        let status_line = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.status.reason_phrase());
        let mut bytes = Vec::with_capacity(status_line.len() + 64 + self.body.len());
        bytes.extend_from_slice(status_line.as_bytes());

        for (name, value) in self.headers.iter() {
            bytes.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }

        // Add the empty line that separates headers from body
        bytes.extend_from_slice(b"\r\n");
        bytes.extend_from_slice(&self.body);

        bytes
    }
}

impl io::Write for HttpResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encode `response` and write it to `writer`.
///
/// Any write failure is returned; the caller is expected to drop the connection.
pub async fn write_response<W>(writer: &mut W, response: &mut HttpResponse) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let bytes = response.encode();
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
