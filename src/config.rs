use crate::error::{ServerError, ServerResult};
use crate::reader::MAX_BUFFER_SIZE;
use crate::routing::Module;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest `Expires` horizon accepted from configuration (100 years)
pub const MAX_EXPIRATION_HOURS: i64 = 100 * 365 * 24;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // Network configuration
    pub listen_address: String,
    pub port: u16,
    pub backlog: u32,

    // Connection settings
    pub socket_timeout_ms: u64,
    pub max_connections: usize,
    pub max_buffer_size: usize,

    /// Name sent in the `Host` header of every response
    pub hostname: String,

    // Logging
    pub log_file: Option<PathBuf>,
    pub log_level: String,

    // Response policy for locally handled requests
    pub compress_responses: bool,
    pub expiration_hours: i64,

    /// Remote modules requests can be forwarded to
    pub modules: Vec<Module>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: 80,
            backlog: 10,

            socket_timeout_ms: 5_000,
            max_connections: num_cpus::get() * 64,
            max_buffer_size: MAX_BUFFER_SIZE,

            hostname: "localhost".to_string(),

            log_file: None,
            log_level: "info".to_string(),

            compress_responses: false,
            expiration_hours: -1,

            modules: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address and port to listen on
    pub fn with_address(mut self, address: &str, port: u16) -> Self {
        self.listen_address = address.to_string();
        self.port = port;
        self
    }

    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    pub fn with_log_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_responses = enabled;
        self
    }

    pub fn with_expiration_hours(mut self, hours: i64) -> Self {
        self.expiration_hours = hours;
        self
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Get the full address string (address:port)
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }

    /// Check the settings for values the server cannot run with
    pub fn validate(&self) -> ServerResult<()> {
        if self.hostname.trim().is_empty() {
            return Err(ServerError::Config("hostname must not be empty".to_string()));
        }
        if self.backlog == 0 {
            return Err(ServerError::Config("backlog must be positive".to_string()));
        }
        if self.socket_timeout_ms == 0 {
            return Err(ServerError::Config("socket timeout must be positive".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".to_string()));
        }
        if self.max_buffer_size == 0 {
            return Err(ServerError::Config("max_buffer_size must be positive".to_string()));
        }
        if self.expiration_hours > MAX_EXPIRATION_HOURS {
            return Err(ServerError::Config(format!(
                "expiration_hours must not exceed {}",
                MAX_EXPIRATION_HOURS
            )));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ServerError::Config(format!("unknown log level: {}", self.log_level)));
        }

        let mut seen = HashSet::new();
        for module in &self.modules {
            module.validate()?;
            if !seen.insert(module.identification.as_str()) {
                return Err(ServerError::Config(format!(
                    "duplicate module identification: {}",
                    module.identification
                )));
            }
        }

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_json_file<P: AsRef<Path>>(&self, path: P) -> ServerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
