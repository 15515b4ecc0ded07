use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::RepeatMode;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/loopify/config.toml` or `~/.config/loopify/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `LOOPIFY__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
    pub catalog: CatalogSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Initial volume in `[0, 1]`.
    pub volume: f32,
    /// How long a track may stay loading before it is given up on
    /// (milliseconds). Set to 0 to wait forever.
    pub ready_timeout_ms: u64,
    /// Interval between position updates from the sink (milliseconds).
    pub position_tick_ms: u64,
    /// Fade-out duration when quitting (milliseconds).
    /// Set to 0 to stop immediately.
    pub quit_fade_out_ms: u64,
    /// Number of seconds to seek when pressing `h` / `l`.
    pub seek_step_seconds: f64,
    /// Volume change per `+` / `-` press.
    pub volume_step: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            ready_timeout_ms: 10_000,
            position_tick_ms: 250,
            quit_fade_out_ms: 500,
            seek_step_seconds: 5.0,
            volume_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Whether shuffle starts enabled.
    pub shuffle: bool,
    /// Default repeat mode.
    pub repeat_mode: RepeatModeSetting,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatModeSetting {
    #[default]
    #[serde(alias = "none", alias = "no-repeat", alias = "no_repeat")]
    Off,
    #[serde(
        alias = "repeat-all",
        alias = "repeat_all",
        alias = "loop-all",
        alias = "loop_all"
    )]
    All,
    #[serde(
        alias = "repeat-one",
        alias = "repeat_one",
        alias = "loop-one",
        alias = "loop_one"
    )]
    One,
}

impl From<RepeatModeSetting> for RepeatMode {
    fn from(value: RepeatModeSetting) -> Self {
        match value {
            RepeatModeSetting::Off => RepeatMode::Off,
            RepeatModeSetting::All => RepeatMode::All,
            RepeatModeSetting::One => RepeatMode::One,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Where the imported-track library and the log file live.
    /// Defaults to `$XDG_DATA_HOME/loopify` or `~/.local/share/loopify`.
    pub data_dir: Option<PathBuf>,
    /// Whether to follow symlinks during discovery.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: ["mp3", "wav", "ogg", "flac", "m4a", "aac", "opus"]
                .into_iter()
                .map(String::from)
                .collect(),
            data_dir: None,
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub base_url: String,
    /// Jamendo API client id. The default is the public demo id.
    pub client_id: String,
    /// Number of tracks (or albums) per request.
    pub limit: usize,
    pub timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.jamendo.com/v3.0".to_string(),
            client_id: "b6747d04".to_string(),
            limit: 20,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive, e.g. `"info"` or `"loopify=debug"`.
    /// `LOOPIFY_LOG` overrides it.
    pub filter: Option<String>,
    /// Log file used by the interactive player. Defaults to `<data_dir>/loopify.log`.
    pub file: Option<PathBuf>,
}
