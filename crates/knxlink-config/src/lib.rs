//! Shared configuration for knxlink.
//!
//! TOML profiles merged with `KNXLINK_` environment variables, and
//! translation to `knxlink_core::BridgeConfig`. The CLI adds
//! `GlobalOpts`-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use knxlink_core::config::{DEFAULT_NAMESPACE, MIN_SEND_DELAY};
use knxlink_core::{BridgeConfig, ImportConfig, StyleOverride, SyncConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named bridge profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Profile `name`, or the built-in defaults when it is not configured
    /// and `name` is the default profile.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        if let Some(profile) = self.profiles.get(name) {
            return Ok(profile.clone());
        }
        let default = self.default_profile.as_deref().unwrap_or("default");
        if name == default {
            Ok(Profile::default())
        } else {
            Err(ConfigError::ProfileNotFound { name: name.into() })
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Output format used when `--output` is not given.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}

/// A named bridge profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Adapter namespace for project files and store objects.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Directory holding one subdirectory per file namespace.
    #[serde(default = "default_file_root")]
    pub file_root: PathBuf,

    /// Project file name inside the namespace directory.
    pub project_file: Option<String>,

    /// `auto`, `Free`, `TwoLevel` or `ThreeLevel`.
    #[serde(default = "default_address_style")]
    pub address_style: String,

    /// Minimum delay between two bus telegrams, in milliseconds.
    #[serde(default = "default_min_send_delay_ms")]
    pub min_send_delay_ms: u64,

    /// Read every readable group address after connecting.
    #[serde(default = "default_true")]
    pub read_on_connect: bool,

    /// Acknowledge store commands as soon as they are queued.
    #[serde(default)]
    pub ack_on_write: bool,

    /// JSON snapshot of the object store. Defaults to the data directory.
    pub objects_path: Option<PathBuf>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            file_root: default_file_root(),
            project_file: None,
            address_style: default_address_style(),
            min_send_delay_ms: default_min_send_delay_ms(),
            read_on_connect: true,
            ack_on_write: false,
            objects_path: None,
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}
fn default_file_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_address_style() -> String {
    "auto".into()
}
fn default_min_send_delay_ms() -> u64 {
    50
}
fn default_true() -> bool {
    true
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "knxlink", "knxlink")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || fallback_dir(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the object store snapshot.
pub fn default_objects_path() -> PathBuf {
    project_dirs().map_or_else(
        || fallback_dir(".local/share").join("objects.json"),
        |dirs| dirs.data_dir().join("objects.json"),
    )
}

fn fallback_dir(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("knxlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is
/// not an error.
///
/// Environment keys use `__` as the nesting separator, e.g.
/// `KNXLINK_PROFILES__HOME__PROJECT_FILE=home.json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("KNXLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse a profile's address style setting.
pub fn parse_style(value: &str) -> Result<StyleOverride, ConfigError> {
    value.parse().map_err(|e: knxlink_core::CoreError| ConfigError::Validation {
        field: "address_style".into(),
        reason: e.to_string(),
    })
}

/// Object store snapshot path of a profile.
pub fn objects_path(profile: &Profile) -> PathBuf {
    profile
        .objects_path
        .clone()
        .unwrap_or_else(default_objects_path)
}

/// Build a `BridgeConfig` from a profile.
pub fn profile_to_bridge_config(profile: &Profile) -> Result<BridgeConfig, ConfigError> {
    if profile.namespace.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "namespace".into(),
            reason: "must not be empty".into(),
        });
    }

    let min_send_delay = Duration::from_millis(profile.min_send_delay_ms);
    if min_send_delay < MIN_SEND_DELAY {
        return Err(ConfigError::Validation {
            field: "min_send_delay_ms".into(),
            reason: format!("must be at least {}", MIN_SEND_DELAY.as_millis()),
        });
    }

    Ok(BridgeConfig {
        import: ImportConfig {
            namespace: profile.namespace.clone(),
            project_file: profile.project_file.clone(),
            style_override: parse_style(&profile.address_style)?,
            work_dir: std::env::temp_dir(),
        },
        sync: SyncConfig {
            min_send_delay,
            read_on_connect: profile.read_on_connect,
            ack_on_write: profile.ack_on_write,
        },
    })
}
