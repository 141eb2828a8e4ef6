//! Configuration sections, one per concern of the daemon.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Playback settings handed to libcanberra at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundConfig {
    /// XDG sound theme name.
    /// Default: Yaru
    #[serde(default = "SoundConfig::default_theme")]
    pub theme: String,

    /// libcanberra output driver.
    /// Default: alsa
    #[serde(default = "SoundConfig::default_driver")]
    pub driver: String,
}

impl SoundConfig {
    fn default_theme() -> String {
        "Yaru".to_string()
    }

    fn default_driver() -> String {
        "alsa".to_string()
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            theme: Self::default_theme(),
            driver: Self::default_driver(),
        }
    }
}

/// Directories watched for change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Screenshot directory; new entries announce `screen-capture`.
    /// Default: unset (taken from `GRIM_DEFAULT_DIR` when present)
    #[serde(default)]
    pub screenshot_dir: Option<PathBuf>,

    /// Storage topology directory; entries appear and vanish with devices.
    /// Default: /dev/disk/by-uuid
    #[serde(default = "WatchConfig::default_device_dir")]
    pub device_dir: PathBuf,
}

impl WatchConfig {
    fn default_device_dir() -> PathBuf {
        PathBuf::from("/dev/disk/by-uuid")
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: None,
            device_dir: Self::default_device_dir(),
        }
    }
}

/// Mixer control device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// ALSA control device name.
    /// Default: default
    #[serde(default = "ControlConfig::default_device")]
    pub device: String,
}

impl ControlConfig {
    fn default_device() -> String {
        "default".to_string()
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            device: Self::default_device(),
        }
    }
}

/// Shutdown behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Hang up the parent's process group once the logout cue has played.
    #[serde(default)]
    pub propagate_kill: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `tracing` filter directive (trace, debug, info, warn, error).
    /// Default: warn
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "warn".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
