//! Tracing setup for a stdio language server
//!
//! stdout carries the LSP wire, so logs go to stderr or, when configured,
//! an append-only log file, as plain text or JSON lines.

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how the server logs
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Log level filter; "info" when unset or unparsable
    pub level: Option<String>,
    /// Append logs to this file instead of stderr
    pub file_path: Option<PathBuf>,
    /// Emit structured JSON instead of human-readable lines
    pub json_format: bool,
}

impl LogConfig {
    /// Merge CLI overrides with the environment (`RUST_LOG`,
    /// `OCLS_LOG_FILE`, `OCLS_LOG_JSON`); the flags win.
    pub fn resolve(level: Option<String>, file_path: Option<PathBuf>) -> Self {
        Self {
            level: level.or_else(|| std::env::var("RUST_LOG").ok()),
            file_path: file_path
                .or_else(|| std::env::var("OCLS_LOG_FILE").ok().map(PathBuf::from)),
            json_format: std::env::var("OCLS_LOG_JSON").is_ok_and(|value| value == "true"),
        }
    }
}

/// Install the process-global subscriber described by `config`
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_new(config.level.as_deref().unwrap_or("info"))
        .or_else(|_| EnvFilter::try_new("info"))?;

    let writer = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    // Colors only make sense for a human watching stderr.
    let ansi = config.file_path.is_none() && !config.json_format;
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_format {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_environment() {
        let config = LogConfig::resolve(
            Some("warn".to_string()),
            Some(PathBuf::from("/custom/path.log")),
        );
        assert_eq!(config.level.as_deref(), Some("warn"));
        assert_eq!(config.file_path, Some(PathBuf::from("/custom/path.log")));
    }

    #[test]
    fn test_init_logging_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        let config = LogConfig {
            level: Some("info".to_string()),
            file_path: Some(path.clone()),
            json_format: true,
        };

        // The global subscriber installs once per test binary; this is the
        // only test calling init_logging.
        init_logging(&config).unwrap();
        tracing::info!("log file smoke test");

        assert!(path.exists());
    }
}
