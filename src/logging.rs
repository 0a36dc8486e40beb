//! Subscriber setup for the crate's `log` diagnostics.
//!
//! Records emitted through the `log` macros are bridged into `tracing` and
//! formatted by a `tracing_subscriber` fmt layer, written either to stderr or
//! appended to the configured log file.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Level filter built from `ServerConfig::log_level`
pub fn filter(config: &ServerConfig) -> ServerResult<EnvFilter> {
    let level: LevelFilter = config
        .log_level
        .parse()
        .map_err(|_| ServerError::Config(format!("unknown log level: {}", config.log_level)))?;
    Ok(EnvFilter::default().add_directive(level.into()))
}

/// Open `path` for appending, creating it if needed
fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber described by the configuration.
///
/// Fails with a `Config` error if one is already installed for this process.
pub fn init(config: &ServerConfig) -> ServerResult<()> {
    let filter = filter(config)?;

    let file_layer = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(open_log_file(path)?)),
        ),
        None => None,
    };
    let stderr_layer = match config.log_file {
        Some(_) => None,
        None => Some(fmt::layer().with_writer(io::stderr)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ServerError::Config(format!("cannot install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_filter_from_config() {
        assert!(filter(&ServerConfig::new()).is_ok());

        let config = ServerConfig {
            log_level: "loud".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(filter(&config), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_init_writes_to_file_once() {
        let path = std::env::temp_dir().join(format!("webrelay-log-{}.log", std::process::id()));
        let _ = fs::remove_file(&path);
        let config = ServerConfig::new().with_log_file(&path);

        init(&config).unwrap();
        log::info!("initialization done");
        log::trace!("hidden");

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("initialization done"));
        assert!(content.contains("INFO"));
        assert!(!content.contains("hidden"));

        assert!(matches!(init(&config), Err(ServerError::Config(_))));
        let _ = fs::remove_file(&path);
    }
}
