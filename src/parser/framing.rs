//! Line reading and body framing over a buffered byte stream.

use log::trace;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};

use crate::parser::error::Error;

/// Longest accepted line in the request head or in a chunk header.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// How the body of a request is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// Exactly this many bytes follow the head.
    Length(u64),
    /// A sequence of chunks terminated by a zero-sized chunk.
    Chunked,
    /// No body.
    Empty,
}

/// Read one `\n`-terminated line, terminator included.
///
/// Returns `Ok(None)` on a clean end of stream. A stream that ends in the middle of a
/// line is an error, as is a line longer than [`MAX_LINE_LENGTH`].
pub(crate) async fn read_line<R>(reader: &mut R, context: &'static str) -> Result<Option<String>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LENGTH as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if n == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_LINE_LENGTH {
            return Err(Error::LineTooLong { limit: MAX_LINE_LENGTH });
        }
        return Err(Error::UnexpectedEof(context));
    }

    String::from_utf8(buf).map(Some).map_err(|_| Error::InvalidUtf8)
}

/// Read exactly `length` bytes. Bytes after them stay in the stream.
pub(crate) async fn read_fixed<R>(reader: &mut R, length: u64, limit: usize) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Unpin,
{
    if length > limit as u64 {
        return Err(Error::BodyTooLarge { limit });
    }

    let mut body = Vec::new();
    (&mut *reader).take(length).read_to_end(&mut body).await?;

    if (body.len() as u64) < length {
        return Err(Error::UnexpectedEof("body"));
    }

    Ok(body)
}

/// Decode a chunked body: `<hex-size>[;ext]\r\n<data>\r\n ... 0\r\n[trailers]\r\n`.
///
/// Chunk extensions and trailer fields are discarded.
pub(crate) async fn read_chunked<R>(reader: &mut R, limit: usize) -> Result<Vec<u8>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();

    loop {
        let line = read_line(reader, "chunk size")
            .await?
            .ok_or(Error::UnexpectedEof("chunk size"))?;
        let size = parse_chunk_size(&line)?;
        if size == 0 {
            break;
        }

        if (body.len() as u64).saturating_add(size) > limit as u64 {
            return Err(Error::BodyTooLarge { limit });
        }

        let start = body.len();
        (&mut *reader).take(size).read_to_end(&mut body).await?;
        if ((body.len() - start) as u64) < size {
            return Err(Error::UnexpectedEof("chunk data"));
        }
        trace!("read chunk of {size} bytes");

        let terminator = read_line(reader, "chunk data")
            .await?
            .ok_or(Error::UnexpectedEof("chunk data"))?;
        if !trim_line_end(&terminator).is_empty() {
            return Err(Error::InvalidChunk("missing CRLF after chunk data".to_string()));
        }
    }

    loop {
        let line = read_line(reader, "trailers")
            .await?
            .ok_or(Error::UnexpectedEof("trailers"))?;
        let line = trim_line_end(&line);
        if line.is_empty() {
            break;
        }
        trace!("discarding trailer field {line}");
    }

    Ok(body)
}

fn parse_chunk_size(line: &str) -> Result<u64, Error> {
    let size = trim_line_end(line);
    let size = size.split(';').next().unwrap_or_default().trim();
    if size.is_empty() {
        return Err(Error::InvalidChunk("missing chunk size".to_string()));
    }
    if !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidChunk(format!("invalid chunk size {size:?}")));
    }

    u64::from_str_radix(size, 16).map_err(|_| Error::InvalidChunk(format!("invalid chunk size {size:?}")))
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(|c| c == '\r' || c == '\n')
}
