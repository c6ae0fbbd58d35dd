//! CLI configuration: thin wrapper around `knxlink_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` overrides (--config,
//! --profile, --objects, --output).

use std::path::PathBuf;

use clap::ValueEnum;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use knxlink_config::{Config, Profile, profile_to_bridge_config, save_config_to};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file in effect: `--config` or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(knxlink_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(knxlink_config::load_config_from(&config_path(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile, with the `--objects` override applied.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    let mut profile = config.profile(&name).map_err(|_| {
        let mut available: Vec<_> = config.profiles.keys().cloned().collect();
        available.sort();
        CliError::ProfileNotFound {
            name: name.clone(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        }
    })?;
    if let Some(ref path) = global.objects {
        profile.objects_path = Some(path.clone());
    }
    Ok((name, profile))
}

/// Output format: flag > config default > table.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&config.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}
