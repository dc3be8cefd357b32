//! Configuration module for the multiconn client.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the client
#[derive(Parser, Debug, Default)]
#[command(name = "multiconn")]
#[command(version = "0.1.0")]
#[command(about = "A multi-connection TCP client", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server host to connect to (e.g., 127.0.0.1)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Server port to connect to (1-65535)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of concurrent connections to open
    #[arg(short = 'n', long)]
    pub connections: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Server host to connect to
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port to connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of concurrent connections to open
    #[serde(default = "default_connections")]
    pub connections: usize,
    /// Maximum bytes received per read attempt
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connections: default_connections(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Message payloads sent over every connection, in order
#[derive(Debug, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_payloads")]
    pub payloads: Vec<String>,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            payloads: default_payloads(),
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    65432
}

fn default_connections() -> usize {
    1
}

fn default_chunk_size() -> usize {
    1024
}

fn default_payloads() -> Vec<String> {
    vec![
        "Message 1 from client.".to_string(),
        "Message 2 from client.".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connections: usize,
    pub chunk_size: usize,
    pub messages: Vec<String>,
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

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            host: cli.host.unwrap_or(toml_config.client.host),
            port: cli.port.unwrap_or(toml_config.client.port),
            connections: cli.connections.unwrap_or(toml_config.client.connections),
            chunk_size: toml_config.client.chunk_size,
            messages: toml_config.messages.payloads,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }

        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidPort,
    InvalidChunkSize,
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
            ConfigError::InvalidPort => write!(f, "Port must be in 1-65535"),
            ConfigError::InvalidChunkSize => write!(f, "Chunk size must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}
