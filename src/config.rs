//! Configuration module for the serve-a-file server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the file server
#[derive(Parser, Debug)]
#[command(name = "serve-a-file")]
#[command(author = "serve-a-file authors")]
#[command(version = "0.1.0")]
#[command(about = "A minimal HTTP/1.1 file server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:4221)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Directory that file operations are served from
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Maximum number of cached files before the cache is cleared
    #[arg(short = 'n', long)]
    pub cache_capacity: Option<usize>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Number of worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: None,
        }
    }
}

/// File-serving configuration
#[derive(Debug, Deserialize)]
pub struct FilesConfig {
    /// Directory that file operations are served from
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Maximum number of cached files before the cache is cleared
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Response-encoder buffer configuration
#[derive(Debug, Deserialize)]
pub struct EncoderConfig {
    /// Initial capacity of each pooled encode buffer in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Maximum number of idle buffers retained by the pool
    #[serde(default = "default_max_pooled")]
    pub max_pooled: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_pooled: default_max_pooled(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:4221".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_buffer_size() -> usize {
    32 * 1024 // 32 KiB
}

fn default_max_pooled() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub root: PathBuf,
    pub cache_capacity: usize,
    pub buffer_size: usize,
    pub max_pooled: usize,
    pub workers: Option<usize>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            root: cli.directory.unwrap_or(toml_config.files.root),
            cache_capacity: cli
                .cache_capacity
                .unwrap_or(toml_config.files.cache_capacity),
            buffer_size: toml_config.encoder.buffer_size,
            max_pooled: toml_config.encoder.max_pooled,
            workers: cli.workers.or(toml_config.server.workers),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
