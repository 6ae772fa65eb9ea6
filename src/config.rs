//! Configuration management for RAX Store Server
//!
//! Separates startup configuration (requires restart) from runtime configuration
//! (shared behind a lock so it can be adjusted while the server is running).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Complete server configuration with startup/runtime separation
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub startup: StartupConfig,

    #[serde(flatten)]
    pub runtime: RuntimeConfig,
}

/// Configuration that requires server restart to take effect
#[derive(Debug, Deserialize, Clone)]
pub struct StartupConfig {
    // ═══ NETWORK (Environment Override Supported) ═══
    /// IP address to bind the listener
    pub bind_address: String,

    /// TCP port for the store protocol. 0 picks an ephemeral port.
    pub port: u16,

    /// Root directory holding every versioned entry
    pub server_root: String,

    // ═══ INTERNAL BEHAVIOR ═══
    /// Chunk size for payload transfers
    pub buffer_size: usize,

    /// Maximum header line length in bytes, newline included
    pub max_command_length: usize,

    /// Maximum logical path length in bytes
    pub max_path_length: usize,

    /// Seconds a connection may sit idle on a network read. 0 disables the timeout.
    pub idle_timeout_secs: u64,

    /// Repeating key for the at-rest payload transform
    pub cipher_key: String,
}

/// Configuration that can be updated at runtime
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Maximum concurrent connections
    /// Environment: RAX_STORE__MAX_CLIENTS
    pub max_clients: usize,

    /// Maximum declared upload size in MB
    /// Environment: RAX_STORE__MAX_FILE_SIZE_MB
    pub max_file_size_mb: u64,
}

/// Thread-safe runtime configuration wrapper
pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            startup: StartupConfig {
                bind_address: "127.0.0.1".into(),
                port: 2024,
                server_root: "server_storage".into(),
                buffer_size: 4096,
                max_command_length: 2048,
                max_path_length: 1024,
                idle_timeout_secs: 300,
                cipher_key: "rax-store".into(),
            },
            runtime: RuntimeConfig {
                max_clients: 64,
                max_file_size_mb: 100,
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides.
    ///
    /// The file is optional; any key it does not set falls back to the defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Same as [`ServerConfig::load`] but reads the named file (extension optional).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("bind_address", defaults.startup.bind_address)?
            .set_default("port", defaults.startup.port as i64)?
            .set_default("server_root", defaults.startup.server_root)?
            .set_default("buffer_size", defaults.startup.buffer_size as i64)?
            .set_default("max_command_length", defaults.startup.max_command_length as i64)?
            .set_default("max_path_length", defaults.startup.max_path_length as i64)?
            .set_default("idle_timeout_secs", defaults.startup.idle_timeout_secs as i64)?
            .set_default("cipher_key", defaults.startup.cipher_key)?
            .set_default("max_clients", defaults.runtime.max_clients as i64)?
            .set_default("max_file_size_mb", defaults.runtime.max_file_size_mb as i64)?
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("RAX_STORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Split into startup (immutable) and runtime (mutable) parts
    pub fn split(self) -> (StartupConfig, SharedRuntimeConfig) {
        let runtime = Arc::new(RwLock::new(self.runtime));
        (self.startup, runtime)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.startup.server_root.is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.startup.cipher_key.is_empty() {
            return Err(config::ConfigError::Message(
                "cipher_key cannot be empty".into(),
            ));
        }

        if self.startup.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.startup.max_path_length == 0 {
            return Err(config::ConfigError::Message(
                "max_path_length must be greater than 0".into(),
            ));
        }

        // Room for the verb, the path and a size field
        if self.startup.max_command_length <= self.startup.max_path_length {
            return Err(config::ConfigError::Message(
                "max_command_length must exceed max_path_length".into(),
            ));
        }

        if self.runtime.max_clients == 0 {
            return Err(config::ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.runtime.max_file_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_file_size_mb must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl StartupConfig {
    /// Get bind address and port as socket address
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    /// Idle timeout for network reads, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl RuntimeConfig {
    /// Get maximum file size in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}
