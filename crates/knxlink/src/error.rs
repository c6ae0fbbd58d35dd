//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use knxlink_config::ConfigError;
use knxlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const UNAVAILABLE: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Import ───────────────────────────────────────────────────────
    #[error("Project import is unavailable in this build")]
    #[diagnostic(
        code(knxlink::import_unavailable),
        help("Rebuild knxlink-core with the `json-project` feature enabled.")
    )]
    ImportUnavailable,

    #[error("No project file configured for profile '{profile}'")]
    #[diagnostic(
        code(knxlink::no_project),
        help(
            "Pass a file name: knxlink import <FILE>\n\
             Or set project_file in the profile: knxlink config init --project-file <FILE>"
        )
    )]
    NoProject { profile: String },

    #[error("Project file '{name}' not found")]
    #[diagnostic(
        code(knxlink::project_not_found),
        help("Looked in: {tried}\nPaths are relative to the profile's file_root.")
    )]
    ProjectNotFound { name: String, tried: String },

    #[error("Project file could not be parsed: {message}")]
    #[diagnostic(code(knxlink::parse))]
    Parse { message: String },

    // ── Entries ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(knxlink::not_found),
        help("Run: knxlink {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Bus ──────────────────────────────────────────────────────────
    #[error("Bus error: {message}")]
    #[diagnostic(code(knxlink::bus))]
    Bus { message: String },

    #[error("Bus is not connected")]
    #[diagnostic(code(knxlink::not_connected))]
    NotConnected,

    #[error("Bus jobs still pending after {seconds}s")]
    #[diagnostic(
        code(knxlink::timeout),
        help("Lower min_send_delay_ms in the profile or retry.")
    )]
    Timeout { seconds: u64 },

    // ── Store ────────────────────────────────────────────────────────
    #[error("Object store error: {message}")]
    #[diagnostic(
        code(knxlink::store),
        help("Check the objects snapshot path (--objects or objects_path in the profile).")
    )]
    Store { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(knxlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(knxlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: knxlink config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(knxlink::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(knxlink::config))]
    Config(Box<figment::Error>),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(knxlink::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(knxlink::json))]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotConnected | Self::Bus { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } | Self::ProjectNotFound { .. } | Self::ProfileNotFound { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoProject { .. } | Self::ConfigExists { .. } => {
                exit_code::USAGE
            }
            Self::ImportUnavailable => exit_code::UNAVAILABLE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ImportUnavailable => CliError::ImportUnavailable,

            CoreError::NoProjectConfigured => CliError::NoProject {
                profile: "current".into(),
            },

            CoreError::FileNotFound { name, tried } => CliError::ProjectNotFound { name, tried },

            CoreError::ParseFailure { message } => CliError::Parse { message },

            CoreError::UnknownEntry { id } => CliError::NotFound {
                resource_type: "entry".into(),
                identifier: id,
                list_command: "entries".into(),
            },

            CoreError::NotConnected => CliError::NotConnected,

            CoreError::Bus { message } => CliError::Bus { message },

            CoreError::BindingFailure { id, address, reason } => CliError::Bus {
                message: format!("cannot bind {address} for {id}: {reason}"),
            },

            CoreError::TxFailure {
                description,
                reason,
            } => CliError::Bus {
                message: format!("{description}: {reason}"),
            },

            CoreError::StoreWriteFailure { id, reason } => CliError::Store {
                message: format!("{id}: {reason}"),
            },

            CoreError::Store { message } => CliError::Store { message },

            CoreError::InvalidAddress { input, style } => CliError::Validation {
                field: "address".into(),
                reason: format!("'{input}' is not a valid {style} address"),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(see: knxlink config profiles)".into(),
            },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

impl From<knxlink_api::Error> for CliError {
    fn from(err: knxlink_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
