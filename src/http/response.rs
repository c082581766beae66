//! HTTP response encoder.
//!
//! Serializes a response into a single pooled buffer and delivers it to
//! the output sink as one bulk write followed by a flush. The buffer is
//! reserved to the exact encoded size up front, so a freshly allocated
//! buffer never reallocates mid-encode.

use crate::pool::BufferPool;
use bytes::BytesMut;
use std::collections::HashMap;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// An HTTP response under construction.
///
/// Populated by the router, encoded exactly once, then discarded.
#[derive(Debug, Clone)]
pub struct Response {
    /// Version token after `HTTP/` (e.g. `1.1`).
    pub version: &'static str,
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase.
    pub reason: &'static str,
    /// Header mapping; iteration order is unspecified.
    pub headers: HashMap<String, String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl Response {
    /// 200 OK with no headers and no body.
    pub fn ok() -> Self {
        Self::with_status(200, "OK")
    }

    /// 201 Created with no headers and no body.
    pub fn created() -> Self {
        Self::with_status(201, "Created")
    }

    /// 404 Not Found with no headers and no body.
    pub fn not_found() -> Self {
        Self::with_status(404, "Not Found")
    }

    fn with_status(status: u16, reason: &'static str) -> Self {
        Self {
            version: "1.1",
            status,
            reason,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Exact number of bytes [`encode`](Self::encode) will produce.
    pub fn encoded_len(&self) -> usize {
        // "HTTP/" + version + " " + status + " " + reason + "\r\n"
        let mut size = 5 + self.version.len() + 1 + digit_count(self.status) + 1;
        size += self.reason.len() + 2;

        for (key, value) in &self.headers {
            size += key.len() + 2 + value.len() + 2;
        }

        // Blank line + body
        size + 2 + self.body.len()
    }

    /// Encode the response and write it to `sink`.
    ///
    /// Uses exactly one buffer checkout from `pool`; the buffer is
    /// returned on every exit path, success or failure, and the sink is
    /// flushed before a successful return.
    pub async fn encode<W: AsyncWrite + Unpin>(
        &self,
        sink: &mut W,
        pool: &BufferPool,
    ) -> io::Result<()> {
        let mut buf = pool.acquire();
        self.encode_into(&mut buf);

        let result = write_out(sink, &buf).await;
        pool.release(buf);
        result
    }

    /// Append the encoded response to `buf`.
    fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());

        // Status line
        buf.extend_from_slice(b"HTTP/");
        buf.extend_from_slice(self.version.as_bytes());
        buf.extend_from_slice(b" ");
        push_decimal(buf, self.status);
        buf.extend_from_slice(b" ");
        buf.extend_from_slice(self.reason.as_bytes());
        buf.extend_from_slice(b"\r\n");

        // Headers
        for (key, value) in &self.headers {
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"\r\n");

        // Body
        buf.extend_from_slice(&self.body);
    }
}

async fn write_out<W: AsyncWrite + Unpin>(sink: &mut W, data: &[u8]) -> io::Result<()> {
    sink.write_all(data).await?;
    sink.flush().await
}

/// Append `n` as decimal ASCII, no leading zeros, at least one digit.
fn push_decimal(buf: &mut BytesMut, mut n: u16) {
    let start = buf.len();
    let count = digit_count(n);
    buf.resize(start + count, 0);

    for i in (0..count).rev() {
        buf[start + i] = b'0' + (n % 10) as u8;
        n /= 10;
    }
}

/// Count decimal digits in `n` (1 for zero).
fn digit_count(n: u16) -> usize {
    if n == 0 {
        return 1;
    }
    let mut n = n;
    let mut count = 0;
    while n > 0 {
        n /= 10;
        count += 1;
    }
    count
}
