//! Response line builder for the cash text protocol
//!
//! Every command yields exactly one `\n`-terminated line: the payload on
//! success, or an error description.

use crate::{CacheError, ProtocolError};
use bytes::BytesMut;

/// Response writer for the cash text protocol
pub struct ResponseWriter {
    buf: BytesMut,
}

impl ResponseWriter {
    /// Create a new response writer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the internal buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Take the buffer, leaving an empty buffer in its place
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    /// Returns true if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write a payload line
    pub fn payload(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\n");
    }

    /// Write a request error line
    pub fn error(&mut self, err: &CacheError) {
        self.buf.extend_from_slice(err.to_string().as_bytes());
        self.buf.extend_from_slice(b"\n");
    }

    /// Write a parse error line
    /// Format: ERROR 'parse error' MESSAGE '<detail>'
    pub fn protocol_error(&mut self, err: &ProtocolError) {
        self.buf.extend_from_slice(b"ERROR 'parse error' MESSAGE '");
        self.buf.extend_from_slice(err.to_string().as_bytes());
        self.buf.extend_from_slice(b"'\n");
    }

    /// Write an internal server error line
    pub fn server_error(&mut self, message: &str) {
        self.buf.extend_from_slice(b"ERROR 'server error' MESSAGE '");
        self.buf.extend_from_slice(message.as_bytes());
        self.buf.extend_from_slice(b"'\n");
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new(4096)
    }
}
