//! serve-a-file: A minimal HTTP/1.1 file server
//!
//! Routes:
//! - `GET /` - liveness check
//! - `GET /echo/{text}` - echo the path suffix back
//! - `GET /user-agent` - echo the User-Agent header
//! - `GET /files/{name}` - serve a file through the in-memory cache
//! - `POST /files/{name}` - create a file and cache it
//!
//! Features:
//! - Manual HTTP/1.1 framing with pooled response buffers
//! - Bounded read-through file cache shared across connections
//! - Optional gzip response compression
//! - Configuration via CLI arguments or TOML file

mod config;
mod handler;
mod http;
mod pool;
mod server;
mod storage;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        root = %config.root.display(),
        cache_capacity = config.cache_capacity,
        buffer_size = config.buffer_size,
        "Starting serve-a-file server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    let server = Server::new(config);
    runtime.block_on(server.run())
}
