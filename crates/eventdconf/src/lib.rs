//! Configuration loading for alsaeventd.
//!
//! Kept free of logging and platform dependencies so it can run before
//! anything else in the daemon is initialized.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/alsaeventd/config.toml` (system)
//! 2. `~/.config/alsaeventd/config.toml` (user)
//! 3. `./alsaeventd.toml`, or the file given with `-c` (local override)
//! 4. Environment variables (`GRIM_DEFAULT_DIR`, `ALSAEVENTD_*`, `RUST_LOG`)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Example Config
//!
//! ```toml
//! [sound]
//! theme = "Yaru"
//! driver = "pulse"
//!
//! [watch]
//! screenshot_dir = "~/Pictures/Screenshots"
//! device_dir = "/dev/disk/by-uuid"
//!
//! [control]
//! device = "default"
//!
//! [shutdown]
//! propagate_kill = true
//!
//! [telemetry]
//! log_level = "warn"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{ControlConfig, ShutdownConfig, SoundConfig, TelemetryConfig, WatchConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventdConfig {
    #[serde(default)]
    pub sound: SoundConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl EventdConfig {
    /// Load configuration from every standard source, with `config_path`
    /// replacing the local override file, and report which files and
    /// variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = EventdConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::apply_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# alsaeventd configuration\n\n");

        output.push_str("[sound]\n");
        output.push_str(&format!("theme = {}\n", quote(&self.sound.theme)));
        output.push_str(&format!("driver = {}\n", quote(&self.sound.driver)));

        output.push_str("\n[watch]\n");
        match &self.watch.screenshot_dir {
            Some(dir) => output.push_str(&format!(
                "screenshot_dir = {}\n",
                quote(&dir.display().to_string())
            )),
            None => output.push_str("# screenshot_dir is unset\n"),
        }
        output.push_str(&format!(
            "device_dir = {}\n",
            quote(&self.watch.device_dir.display().to_string())
        ));

        output.push_str("\n[control]\n");
        output.push_str(&format!("device = {}\n", quote(&self.control.device)));

        output.push_str("\n[shutdown]\n");
        output.push_str(&format!(
            "propagate_kill = {}\n",
            self.shutdown.propagate_kill
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = {}\n",
            quote(&self.telemetry.log_level)
        ));

        output
    }
}

fn quote(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
