//! HTTP/1.1 message framing.
//!
//! Manual wire-format handling for the subset of HTTP/1.1 this server
//! speaks:
//! - `request`: decode a request line, header block and exactly-sized body
//!   from a buffered stream
//! - `response`: encode a status line, headers and body into one pooled
//!   buffer and write it out in a single bulk write

pub mod request;
pub mod response;

pub use request::{decode, DecodeError, Request};
pub use response::Response;
