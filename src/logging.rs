//! `tracing` subscriber setup.
//!
//! The interactive player owns the terminal, so it logs to a file. One-shot
//! commands log to stderr.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Environment variable that overrides `logging.filter`.
pub const LOG_ENV: &str = "LOOPIFY_LOG";

const DEFAULT_FILTER: &str = "info";

/// Pick the filter directive: `LOOPIFY_LOG`, then the configured one, then `info`.
pub fn filter_directive(settings: &LoggingSettings, env_value: Option<String>) -> String {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| settings.filter.clone().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    let directive = filter_directive(settings, std::env::var(LOG_ENV).ok());
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("loopify: invalid log filter {directive:?} ({e}), using {DEFAULT_FILTER}");
        EnvFilter::new(DEFAULT_FILTER)
    })
}

/// Append logs to `path`, creating its directory as needed.
pub fn init_file(settings: &LoggingSettings, path: &Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_env_filter(env_filter(settings))
        .try_init();
    Ok(())
}

pub fn init_stderr(settings: &LoggingSettings) {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(env_filter(settings))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_wins_over_config_and_default() {
        let mut settings = LoggingSettings::default();
        assert_eq!(filter_directive(&settings, None), "info");

        settings.filter = Some("loopify=debug".to_string());
        assert_eq!(filter_directive(&settings, None), "loopify=debug");
        assert_eq!(
            filter_directive(&settings, Some("warn".to_string())),
            "warn"
        );
        assert_eq!(
            filter_directive(&settings, Some("  ".to_string())),
            "loopify=debug"
        );
    }

    #[test]
    fn file_logging_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("loopify.log");
        init_file(&LoggingSettings::default(), &path).unwrap();
        assert!(path.exists());
    }
}
