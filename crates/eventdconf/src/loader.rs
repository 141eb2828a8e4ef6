//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, EventdConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

impl ConfigSources {
    /// TOML comment lines naming every contributing file and variable.
    pub fn describe(&self) -> String {
        let mut output = String::new();
        if self.files.is_empty() {
            output.push_str("# loaded from: built-in defaults\n");
        }
        for path in &self.files {
            output.push_str(&format!("# loaded from: {}\n", path.display()));
        }
        for var in &self.env_overrides {
            output.push_str(&format!("# overridden by: ${}\n", var));
        }
        output
    }
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/alsaeventd/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("alsaeventd/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("alsaeventd.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay the keys it sets onto `config`.
pub fn apply_file(config: &mut EventdConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay keys from a TOML document. Keys that are absent keep their
/// current value, so files stack in load order.
fn apply_toml(config: &mut EventdConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let type_error = |key: &str, expected: &str| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("`{}` must be a {}", key, expected),
    };

    if let Some(sound) = section(&table, "sound", path)? {
        if let Some(v) = sound.get("theme") {
            config.sound.theme = v.as_str().ok_or_else(|| type_error("sound.theme", "string"))?.to_string();
        }
        if let Some(v) = sound.get("driver") {
            config.sound.driver = v.as_str().ok_or_else(|| type_error("sound.driver", "string"))?.to_string();
        }
    }

    if let Some(watch) = section(&table, "watch", path)? {
        if let Some(v) = watch.get("screenshot_dir") {
            let dir = v.as_str().ok_or_else(|| type_error("watch.screenshot_dir", "string"))?;
            config.watch.screenshot_dir = Some(expand_path(dir));
        }
        if let Some(v) = watch.get("device_dir") {
            let dir = v.as_str().ok_or_else(|| type_error("watch.device_dir", "string"))?;
            config.watch.device_dir = expand_path(dir);
        }
    }

    if let Some(control) = section(&table, "control", path)? {
        if let Some(v) = control.get("device") {
            config.control.device = v.as_str().ok_or_else(|| type_error("control.device", "string"))?.to_string();
        }
    }

    if let Some(shutdown) = section(&table, "shutdown", path)? {
        if let Some(v) = shutdown.get("propagate_kill") {
            config.shutdown.propagate_kill = v
                .as_bool()
                .ok_or_else(|| type_error("shutdown.propagate_kill", "boolean"))?;
        }
    }

    if let Some(telemetry) = section(&table, "telemetry", path)? {
        if let Some(v) = telemetry.get("log_level") {
            config.telemetry.log_level = v
                .as_str()
                .ok_or_else(|| type_error("telemetry.log_level", "string"))?
                .to_string();
        }
    }

    Ok(())
}

fn section<'a>(
    table: &'a toml::Table,
    name: &str,
    path: &Path,
) -> Result<Option<&'a toml::Table>, ConfigError> {
    match table.get(name) {
        None => Ok(None),
        Some(value) => value.as_table().map(Some).ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("`{}` must be a table", name),
        }),
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut EventdConfig, sources: &mut ConfigSources) {
    apply_env_overrides_with(config, sources, |key| env::var(key).ok());
}

/// Apply overrides using `lookup` in place of the process environment.
pub fn apply_env_overrides_with<F>(config: &mut EventdConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Set by grim and friends; an empty value means "unset"
    if let Some(v) = lookup("GRIM_DEFAULT_DIR").filter(|v| !v.is_empty()) {
        config.watch.screenshot_dir = Some(expand_path(&v));
        sources.env_overrides.push("GRIM_DEFAULT_DIR".to_string());
    }

    if let Some(v) = lookup("ALSAEVENTD_THEME") {
        config.sound.theme = v;
        sources.env_overrides.push("ALSAEVENTD_THEME".to_string());
    }
    if let Some(v) = lookup("ALSAEVENTD_DRIVER") {
        config.sound.driver = v;
        sources.env_overrides.push("ALSAEVENTD_DRIVER".to_string());
    }
    if let Some(v) = lookup("ALSAEVENTD_CONTROL") {
        config.control.device = v;
        sources.env_overrides.push("ALSAEVENTD_CONTROL".to_string());
    }

    if let Some(v) = lookup("ALSAEVENTD_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("ALSAEVENTD_LOG".to_string());
    }
    // RUST_LOG wins over everything else
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
