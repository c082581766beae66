//! Request routing and response generation.
//!
//! Dispatches a decoded request to the root, echo, user-agent and file
//! operations, populating content headers and optionally gzip-compressing
//! the body when the client advertises support.

use crate::http::{Request, Response};
use crate::storage::{BackingStore, CacheError, FileCache};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use tracing::warn;

/// What kind of content a response body carries.
enum ContentKind {
    Text,
    Data,
}

impl ContentKind {
    fn mime(&self) -> &'static str {
        match self {
            ContentKind::Text => "text/plain",
            ContentKind::Data => "application/octet-stream",
        }
    }
}

/// Dispatch a decoded request to the matching operation.
///
/// Only a failed compression surfaces as an error; operation failures
/// map to response statuses.
pub fn route<S: BackingStore>(request: &Request, cache: &FileCache<S>) -> io::Result<Response> {
    match request.method.as_str() {
        "GET" => handle_get(request, cache),
        "POST" => Ok(handle_post(request, cache)),
        _ => Ok(Response::not_found()),
    }
}

fn handle_get<S: BackingStore>(request: &Request, cache: &FileCache<S>) -> io::Result<Response> {
    let gzip = request
        .header("Accept-Encoding")
        .is_some_and(|v| v.contains("gzip"));

    // A User-Agent header takes precedence over target matching
    if let Some(agent) = request.header("User-Agent") {
        return content_response(agent.as_bytes().to_vec(), ContentKind::Text, gzip);
    }

    if request.target == "/" {
        return Ok(Response::ok());
    }

    if let Some(text) = request.target.strip_prefix("/echo/") {
        return content_response(text.as_bytes().to_vec(), ContentKind::Text, gzip);
    }

    if let Some(name) = request.target.strip_prefix("/files/") {
        return match cache.get(name) {
            Ok(data) => content_response(data.to_vec(), ContentKind::Data, gzip),
            Err(CacheError::NotFound) => Ok(Response::not_found()),
            Err(e) => {
                warn!(name, error = %e, "Failed to read file");
                Ok(Response::not_found())
            }
        };
    }

    Ok(Response::not_found())
}

fn handle_post<S: BackingStore>(request: &Request, cache: &FileCache<S>) -> Response {
    let Some(name) = request.target.strip_prefix("/files/") else {
        return Response::not_found();
    };

    match cache.put(name, bytes::Bytes::copy_from_slice(&request.body)) {
        Ok(()) => Response::created(),
        Err(e) => {
            warn!(name, error = %e, "Failed to create file");
            Response::not_found()
        }
    }
}

/// Build a 200 response around `message`, compressing it when requested.
fn content_response(message: Vec<u8>, kind: ContentKind, gzip: bool) -> io::Result<Response> {
    let mut response = Response::ok();
    response
        .headers
        .insert("Content-Type".to_string(), kind.mime().to_string());

    let body = if gzip {
        response
            .headers
            .insert("Content-Encoding".to_string(), "gzip".to_string());
        gzip_compress(&message)?
    } else {
        message
    };

    response
        .headers
        .insert("Content-Length".to_string(), body.len().to_string());
    response.body = body;
    Ok(response)
}

fn gzip_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len()), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
