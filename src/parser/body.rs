//! Request body stream.

use std::io::{self, Cursor, Read};

/// The body of a decoded request.
///
/// The decoder hands the framed body over fully buffered; reading drains it, so
/// the bytes can be consumed only once.
#[derive(Debug, Clone, Default)]
pub struct Body {
    inner: Cursor<Vec<u8>>,
}

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A body holding `bytes`.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Cursor::new(bytes.into()),
        }
    }

    fn offset(&self) -> usize {
        usize::try_from(self.inner.position())
            .unwrap_or(usize::MAX)
            .min(self.inner.get_ref().len())
    }

    /// Number of bytes not read yet.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len() - self.offset()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain and return every byte not read yet.
    pub fn read_all(&mut self) -> Vec<u8> {
        let offset = self.offset();
        let rest = self.inner.get_ref()[offset..].to_vec();
        let end = self.inner.get_ref().len() as u64;
        self.inner.set_position(end);
        rest
    }

    /// Drain the remaining bytes as (lossy) UTF-8 text.
    pub fn read_to_string_lossy(&mut self) -> String {
        String::from_utf8_lossy(&self.read_all()).into_owned()
    }

    /// Consume the body, returning the bytes not read yet.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.read_all()
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }
}
