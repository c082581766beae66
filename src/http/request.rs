//! HTTP request decoder.
//!
//! Reads one request from a buffered byte stream: request line, header
//! block terminated by a blank line, then a body of exactly
//! `Content-Length` bytes.

use std::collections::HashMap;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// A decoded HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Method token (e.g. `GET`).
    pub method: String,
    /// Request target (e.g. `/files/hello.txt`).
    pub target: String,
    /// Protocol version token as written (e.g. `HTTP/1.1`).
    pub version: String,
    /// Header mapping; duplicate keys overwrite, last write wins.
    pub headers: HashMap<String, String>,
    /// Raw body bytes, exactly `Content-Length` long (empty if absent).
    pub body: Vec<u8>,
}

impl Request {
    /// Look up a header value by exact key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// Request decoding errors
#[derive(Debug)]
pub enum DecodeError {
    /// The peer closed the connection before sending a request.
    ConnectionClosed,
    /// Request line did not split into method, target and version.
    MalformedStartLine,
    /// Header line without a `:` separator, or not valid UTF-8.
    MalformedHeader,
    /// `Content-Length` value is not a non-negative integer.
    MalformedContentLength,
    /// Stream ended before the declared body length was read.
    TruncatedBody,
    /// Stream failure.
    Io(io::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::ConnectionClosed => write!(f, "connection closed"),
            DecodeError::MalformedStartLine => write!(f, "malformed request line"),
            DecodeError::MalformedHeader => write!(f, "malformed header line"),
            DecodeError::MalformedContentLength => write!(f, "malformed Content-Length"),
            DecodeError::TruncatedBody => write!(f, "stream ended inside body"),
            DecodeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        DecodeError::Io(e)
    }
}

/// Decode one request from a buffered stream.
pub async fn decode<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Request, DecodeError> {
    let mut line = Vec::with_capacity(128);

    // Request line (e.g. "GET / HTTP/1.1\r\n")
    let n = read_line(reader, &mut line).await?;
    if n == 0 {
        return Err(DecodeError::ConnectionClosed);
    }

    let start_line =
        std::str::from_utf8(trim_line_ending(&line)).map_err(|_| DecodeError::MalformedStartLine)?;

    let mut fields = start_line.split_ascii_whitespace();
    let method = fields.next();
    let target = fields.next();
    let version = fields.next();
    let (method, target, version) = match (method, target, version, fields.next()) {
        (Some(m), Some(t), Some(v), None) => (m.to_string(), t.to_string(), v.to_string()),
        _ => return Err(DecodeError::MalformedStartLine),
    };

    let headers = read_headers(reader, &mut line).await?;

    // Body length comes from Content-Length; absent means empty
    let body = match headers.get("Content-Length") {
        Some(value) => {
            let length: usize = value
                .parse()
                .map_err(|_| DecodeError::MalformedContentLength)?;
            read_body(reader, length).await?
        }
        None => Vec::new(),
    };

    Ok(Request {
        method,
        target,
        version,
        headers,
        body,
    })
}

/// Read header lines until the blank line that ends the block.
async fn read_headers<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut Vec<u8>,
) -> Result<HashMap<String, String>, DecodeError> {
    let mut headers = HashMap::new();

    loop {
        let n = read_line(reader, line).await?;
        if n == 0 {
            // Header block never terminated
            return Err(DecodeError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside header block",
            )));
        }

        let trimmed = trim_line_ending(line);
        if trimmed.is_empty() {
            break;
        }

        let text = std::str::from_utf8(trimmed).map_err(|_| DecodeError::MalformedHeader)?;
        let (key, value) = text.split_once(':').ok_or(DecodeError::MalformedHeader)?;
        headers.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(headers)
}

/// Read exactly `length` body bytes.
async fn read_body<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    length: usize,
) -> Result<Vec<u8>, DecodeError> {
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::TruncatedBody
        } else {
            DecodeError::Io(e)
        }
    })?;
    Ok(body)
}

/// Read one `\n`-terminated line into `line`, returning bytes read.
async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut Vec<u8>,
) -> io::Result<usize> {
    line.clear();
    reader.read_until(b'\n', line).await
}

/// Strip a trailing `\n` and the `\r` before it, if present.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
