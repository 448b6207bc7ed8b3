//! HTTP request representation and decoding.

use http::Uri;
use serde::de::DeserializeOwned;
use tokio::io::AsyncBufRead;

use crate::parser::body::Body;
use crate::parser::error::Error;
use crate::parser::framing::{read_chunked, read_fixed, read_line, BodyFraming};
use crate::parser::headers::Headers;

/// Represents a decoded HTTP request.
#[derive(Debug)]
pub struct HttpRequest {
    /// The method token, exactly as sent by the client
    pub method: String,
    /// The parsed request target (path and query)
    pub uri: Uri,
    /// The protocol version token, e.g. `HTTP/1.1`
    pub version: String,
    /// The HTTP headers
    pub headers: Headers,
    /// The de-framed request body
    pub body: Body,
}

impl HttpRequest {
    /// Create a new HTTP/1.1 request.
    pub fn new(method: impl Into<String>, uri: Uri, headers: Headers, body: Body) -> Self {
        Self {
            method: method.into(),
            uri,
            version: "HTTP/1.1".to_string(),
            headers,
            body,
        }
    }

    /// The path component of the request target.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Decode the query string into a typed value.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_urlencoded::from_str(self.query().unwrap_or_default())?)
    }

    /// The percent-decoded query parameters, in order of appearance.
    pub fn query_params(&self) -> Result<Vec<(String, String)>, Error> {
        self.query_as()
    }

    /// The first value of query parameter `name`.
    pub fn get_query_param(&self, name: &str) -> Option<String> {
        self.query_params()
            .ok()?
            .into_iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }

    /// Get the first value of a header. Header names are case-insensitive.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    /// Check if the request has a JSON body.
    ///
    /// # Returns
    ///
    /// true if the Content-Type header is application/json, false otherwise
    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }

    /// Parse the request body as JSON.
    ///
    /// This drains the body.
    pub fn json<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_slice(&self.body.read_all())?;
        Ok(json)
    }
}

/// Decode one HTTP request from a buffered byte stream.
///
/// Reads the request line, the header block and then exactly as many body bytes as
/// the framing headers announce; anything after the body is left in `reader`.
/// Bodies larger than `max_body_size` are rejected.
///
/// Framing is chosen in this order: the last `Content-Length` value, then a
/// `Transfer-Encoding` whose last value is `chunked`, otherwise no body.
pub async fn read_request<R>(reader: &mut R, max_body_size: usize) -> Result<HttpRequest, Error>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader, "request line")
        .await?
        .ok_or(Error::EmptyRequest)?;
    let (method, target, version) = parse_request_line(&line)?;

    let uri = target.parse::<Uri>().map_err(|e| Error::InvalidUri {
        target: target.to_string(),
        reason: e.to_string(),
    })?;

    let headers = read_headers(reader).await?;

    let body = match body_framing(&headers)? {
        BodyFraming::Length(length) => read_fixed(reader, length, max_body_size).await?,
        BodyFraming::Chunked => read_chunked(reader, max_body_size).await?,
        BodyFraming::Empty => Vec::new(),
    };

    Ok(HttpRequest {
        method: method.to_string(),
        uri,
        version: version.to_string(),
        headers,
        body: Body::from_bytes(body),
    })
}

/// Decode an HTTP request held entirely in memory.
pub async fn parse_request(mut input: &[u8]) -> Result<HttpRequest, Error> {
    read_request(&mut input, usize::MAX).await
}

/// Split a request line on single spaces into method, target and version.
fn parse_request_line(line: &str) -> Result<(&str, &str, &str), Error> {
    let line = line.trim();
    let parts: Vec<&str> = line.split(' ').collect();

    match parts.as_slice() {
        [method, target, version] => Ok((*method, *target, *version)),
        _ => Err(Error::MalformedRequestLine(line.to_string())),
    }
}

async fn read_headers<R>(reader: &mut R) -> Result<Headers, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Headers::new();

    loop {
        let line = read_line(reader, "headers")
            .await?
            .ok_or(Error::UnexpectedEof("headers"))?;

        // Empty line indicates the end of headers
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderFormat(line.to_string()))?;
        headers.add(name.trim(), value.trim());
    }

    Ok(headers)
}

/// Work out how the body following `headers` is framed.
pub fn body_framing(headers: &Headers) -> Result<BodyFraming, Error> {
    if let Some(value) = headers.last("Content-Length") {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidContentLength(value.to_string()));
        }
        let length = value
            .parse::<u64>()
            .map_err(|_| Error::InvalidContentLength(value.to_string()))?;
        return Ok(BodyFraming::Length(length));
    }

    let chunked = headers
        .last("Transfer-Encoding")
        .is_some_and(|encoding| encoding.eq_ignore_ascii_case("chunked"));
    if chunked {
        return Ok(BodyFraming::Chunked);
    }

    Ok(BodyFraming::Empty)
}
