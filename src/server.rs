//! TCP server for handling HTTP connections.
//!
//! Accepts incoming connections and runs each one on its own task:
//! decode a request, route it, encode the response, until the peer
//! closes or the exchange fails.

use crate::config::Config;
use crate::handler;
use crate::http::{self, DecodeError};
use crate::pool::BufferPool;
use crate::storage::{BackingStore, DiskStore, FileCache};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace, warn};

/// Maximum number of concurrent connections
const MAX_CONNECTIONS: usize = 10000;

/// Listen backlog handed to the kernel
const BACKLOG: i32 = 1024;

/// Server instance
///
/// Owns the cache and buffer pool shared by all connection tasks, so
/// multiple servers can coexist in one process without interfering.
pub struct Server {
    config: Config,
    cache: Arc<FileCache<DiskStore>>,
    pool: Arc<BufferPool>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let cache = FileCache::new(DiskStore::new(config.root.clone()), config.cache_capacity);
        let pool = Arc::new(BufferPool::new(config.buffer_size, config.max_pooled));

        Server {
            config,
            cache,
            pool,
            connection_limit: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        }
    }

    /// Start the server and begin accepting connections
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = bind_listener(&self.config.listen)?;
        info!(
            address = %self.config.listen,
            root = %self.config.root.display(),
            "Server listening"
        );

        loop {
            // Wait for a connection slot
            let permit = self.connection_limit.clone().acquire_owned().await?;

            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    let cache = Arc::clone(&self.cache);
                    let pool = Arc::clone(&self.pool);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, cache, pool).await {
                            debug!(error = %e, "Connection error");
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Get a reference to the cache for testing
    #[cfg(test)]
    pub fn cache(&self) -> &Arc<FileCache<DiskStore>> {
        &self.cache
    }
}

/// Bind the listener socket with reuse-address and an explicit backlog.
fn bind_listener(addr: &str) -> Result<TcpListener, Box<dyn std::error::Error>> {
    let addr: SocketAddr = addr.parse()?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(TcpListener::from_std(socket.into())?)
}

/// Handle a single client connection
///
/// Serves sequential request/response exchanges until the peer closes
/// the stream or an exchange fails.
async fn handle_connection<C, S>(
    stream: C,
    cache: Arc<FileCache<S>>,
    pool: Arc<BufferPool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    C: AsyncRead + AsyncWrite + Send,
    S: BackingStore,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    loop {
        let request = match http::decode(&mut reader).await {
            Ok(request) => request,
            Err(DecodeError::ConnectionClosed) => {
                trace!("Connection closed by client");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode request");
                return Err(e.into());
            }
        };

        debug!(method = %request.method, target = %request.target, "Received request");

        let response = handler::route(&request, &cache)?;

        debug!(status = response.status, "Sending response");
        response.encode(&mut writer, &pool).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_config(root: PathBuf) -> Config {
        Config {
            listen: "127.0.0.1:0".to_string(),
            root,
            cache_capacity: 10,
            buffer_size: 1024,
            max_pooled: 4,
            workers: None,
            log_level: "info".to_string(),
        }
    }

    fn test_parts(root: PathBuf) -> (Arc<FileCache<DiskStore>>, Arc<BufferPool>) {
        let cache = FileCache::new(DiskStore::new(root), 10);
        let pool = Arc::new(BufferPool::new(1024, 4));
        (cache, pool)
    }

    async fn exchange(root: PathBuf, input: &[u8]) -> Vec<u8> {
        let (cache, pool) = test_parts(root);
        let (client, server) = tokio::io::duplex(16 * 1024);
        let task = tokio::spawn(handle_connection(server, cache, pool));

        let (mut read_half, mut write_half) = tokio::io::split(client);
        write_half.write_all(input).await.unwrap();
        write_half.shutdown().await.unwrap();

        let mut output = Vec::new();
        read_half.read_to_end(&mut output).await.unwrap();
        task.await.unwrap().unwrap();
        output
    }

    fn temp_root(tag: &str) -> PathBuf {
        let root =
            std::env::temp_dir().join(format!("serve-a-file-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn test_server_creation() {
        let server = Server::new(test_config(PathBuf::from(".")));
        assert!(server.cache().is_empty());
    }

    #[tokio::test]
    async fn test_echo_exchange() {
        let output = exchange(
            std::env::temp_dir(),
            b"GET /echo/hey HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(text.ends_with("\r\n\r\nhey"));
    }

    #[tokio::test]
    async fn test_sequential_exchanges_on_one_connection() {
        let output = exchange(
            std::env::temp_dir(),
            b"GET / HTTP/1.1\r\n\r\nGET /echo/second HTTP/1.1\r\n\r\n",
        )
        .await;

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n\r\n"));
        assert!(text.ends_with("\r\n\r\nsecond"));
    }

    #[tokio::test]
    async fn test_file_create_then_fetch() {
        let root = temp_root("roundtrip");

        let mut input = Vec::new();
        input.extend_from_slice(
            b"POST /files/note.txt HTTP/1.1\r\nContent-Length: 9\r\n\r\nsome text",
        );
        input.extend_from_slice(b"GET /files/note.txt HTTP/1.1\r\n\r\n");
        let output = exchange(root.clone(), &input).await;

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("HTTP/1.1 201 Created\r\n\r\n"));
        assert!(text.contains("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/octet-stream\r\n"));
        assert!(text.ends_with("\r\n\r\nsome text"));

        // Written through to disk, not just cached
        assert_eq!(
            std::fs::read(root.join("note.txt")).unwrap(),
            b"some text"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let root = temp_root("missing");
        let output = exchange(root.clone(), b"GET /files/absent.txt HTTP/1.1\r\n\r\n").await;

        assert_eq!(output, b"HTTP/1.1 404 Not Found\r\n\r\n");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_malformed_request_terminates_connection() {
        let (cache, pool) = test_parts(std::env::temp_dir());
        let (client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(handle_connection(server, cache, pool));

        let (mut read_half, mut write_half) = tokio::io::split(client);
        write_half.write_all(b"NONSENSE\r\n\r\n").await.unwrap();
        write_half.shutdown().await.unwrap();

        let mut output = Vec::new();
        read_half.read_to_end(&mut output).await.unwrap();
        assert!(output.is_empty());
        assert!(task.await.unwrap().is_err());
    }
}
