//! TOML configuration for the modeline host.
//!
//! Read from `$XDG_CONFIG_HOME/modeline/config.toml`, falling back to
//! `~/.config/modeline/config.toml`.  Every field has a default, so a missing
//! default file or a file with only some sections is valid.  A file named
//! explicitly must exist:
//!
//! ```toml
//! [resize]
//! enabled = true
//! max_new_modes = 32
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Environment overrides
//!
//! Applied after the file is read:
//!
//! | Variable                 | Effect                                         |
//! |--------------------------|------------------------------------------------|
//! | `MODELINE_MAX_NEW_MODES` | replaces `resize.max_new_modes`                |
//! | `MODELINE_RESIZE`        | `0`, `false`, `no` or `off` disables resizing  |

use std::path::{Path, PathBuf};

use modeline_core::{DEFAULT_MAX_NEW_MODES, MIN_MAX_NEW_MODES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::resolution_manager::ResizeSettings;

/// Environment variable overriding `resize.max_new_modes`.
pub const ENV_MAX_NEW_MODES: &str = "MODELINE_MAX_NEW_MODES";
/// Environment variable that can switch resizing off.
pub const ENV_RESIZE: &str = "MODELINE_RESIZE";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine config directory")]
    NoConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or malformed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    #[serde(default)]
    pub resize: ResizeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolution management settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResizeConfig {
    /// Master switch for resizing and mode synthesis.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How many synthesized modes are kept before the oldest is destroyed.
    #[serde(default = "default_max_new_modes")]
    pub max_new_modes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"modeline_host=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}
fn default_max_new_modes() -> usize {
    DEFAULT_MAX_NEW_MODES
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_new_modes: default_max_new_modes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl HostConfig {
    /// Loads `path` (or the default location), applies the process
    /// environment and validates the result.
    ///
    /// Only the default location may be missing; an explicit `path` that
    /// does not exist is an error.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from reading, overriding or validating.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => load_config_file(path)?,
            None => load_config(&config_file_path()?)?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `MODELINE_*` overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] if `MODELINE_MAX_NEW_MODES` is not an
    /// unsigned integer.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_NEW_MODES) {
            self.resize.max_new_modes =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: ENV_MAX_NEW_MODES,
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
        }
        if let Some(raw) = lookup(ENV_RESIZE) {
            if is_off(&raw) {
                self.resize.enabled = false;
            }
        }
        Ok(())
    }

    /// Rejects settings the resolution manager cannot run with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] if `max_new_modes < 2`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resize.max_new_modes < MIN_MAX_NEW_MODES {
            return Err(ConfigError::InvalidValue {
                key: "resize.max_new_modes",
                value: self.resize.max_new_modes.to_string(),
                reason: format!("must be at least {MIN_MAX_NEW_MODES}"),
            });
        }
        Ok(())
    }

    pub fn resize_settings(&self) -> ResizeSettings {
        ResizeSettings {
            enabled: self.resize.enabled,
            max_new_modes: self.resize.max_new_modes,
        }
    }
}

fn is_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

// ── Config file ───────────────────────────────────────────────────────────────

/// `$XDG_CONFIG_HOME/modeline`, or `~/.config/modeline`.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] when neither variable is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .map(|base| base.join("modeline"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Full path of the default config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Reads `path`, returning `HostConfig::default()` if it does not exist.
///
/// No overrides or validation are applied.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    read_config(path, true)
}

/// Reads `path`, which must exist.
///
/// No overrides or validation are applied.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for any file-system error, including a
/// missing file, and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_file(path: &Path) -> Result<HostConfig, ConfigError> {
    read_config(path, false)
}

fn read_config(path: &Path, missing_ok: bool) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if missing_ok && e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
