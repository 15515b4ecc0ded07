use std::{env, path::PathBuf};

use super::schema::Settings;

const APP_DIR: &str = "loopify";

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `LOOPIFY__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("LOOPIFY")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err("audio.volume must be within [0, 1]".to_string());
        }
        if self.audio.position_tick_ms == 0 {
            return Err("audio.position_tick_ms must be >= 1".to_string());
        }
        if !self.audio.seek_step_seconds.is_finite() || self.audio.seek_step_seconds <= 0.0 {
            return Err("audio.seek_step_seconds must be > 0".to_string());
        }
        if !self.audio.volume_step.is_finite() || self.audio.volume_step <= 0.0 {
            return Err("audio.volume_step must be > 0".to_string());
        }
        if self.library.extensions.is_empty() {
            return Err("library.extensions must not be empty".to_string());
        }
        if self.catalog.limit == 0 {
            return Err("catalog.limit must be >= 1".to_string());
        }
        if self.catalog.base_url.trim().is_empty() {
            return Err("catalog.base_url must not be empty".to_string());
        }
        Ok(())
    }

    /// Directory holding the persisted library and the default log file.
    pub fn data_dir(&self) -> PathBuf {
        self.library
            .data_dir
            .clone()
            .or_else(default_data_dir)
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
    }

    /// Log file used by the interactive player.
    pub fn log_file(&self) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("loopify.log"))
    }
}

/// Resolve the config path from `LOOPIFY_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("LOOPIFY_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/loopify/config.toml`
/// or `~/.config/loopify/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config").map(|d| d.join(APP_DIR).join("config.toml"))
}

/// `$XDG_DATA_HOME/loopify` or `~/.local/share/loopify`.
pub fn default_data_dir() -> Option<PathBuf> {
    xdg_dir("XDG_DATA_HOME", ".local/share").map(|d| d.join(APP_DIR))
}

fn xdg_dir(var: &str, home_fallback: &str) -> Option<PathBuf> {
    if let Some(xdg) = env::var_os(var).filter(|v| !v.is_empty()) {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(home_fallback))
    }
}
