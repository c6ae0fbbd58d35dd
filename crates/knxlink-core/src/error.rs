// ── Core error types ──
//
// User-facing errors from knxlink-core. Collaborator failures arrive as
// `knxlink_api::Error` and are translated by the `From` impl below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Import errors ────────────────────────────────────────────────
    #[error("Project import is unavailable: no project parser is available")]
    ImportUnavailable,

    #[error("No project file configured")]
    NoProjectConfigured,

    #[error("Project file '{name}' not found (tried {tried})")]
    FileNotFound { name: String, tried: String },

    #[error("Project file could not be parsed: {message}")]
    ParseFailure { message: String },

    // ── Runtime errors ───────────────────────────────────────────────
    #[error("Cannot bind datapoint {address} for {id}: {reason}")]
    BindingFailure {
        id: String,
        address: String,
        reason: String,
    },

    #[error("Bus job '{description}' failed: {reason}")]
    TxFailure { description: String, reason: String },

    #[error("Writing state {id} failed: {reason}")]
    StoreWriteFailure { id: String, reason: String },

    #[error("Bus connection is not established")]
    NotConnected,

    #[error("No mapping record for {id}")]
    UnknownEntry { id: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Invalid {style} group address '{input}'")]
    InvalidAddress { input: String, style: String },

    // ── Collaborator errors (wrapped, not exposed raw) ───────────────
    #[error("Bus error: {message}")]
    Bus { message: String },

    #[error("State store error: {message}")]
    Store { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from collaborator errors ──────────────────────────────

impl From<knxlink_api::Error> for CoreError {
    fn from(err: knxlink_api::Error) -> Self {
        match err {
            knxlink_api::Error::NotConnected => CoreError::NotConnected,
            knxlink_api::Error::Bus { message } => CoreError::Bus { message },
            knxlink_api::Error::Datapoint { address, reason } => CoreError::Bus {
                message: format!("datapoint {address}: {reason}"),
            },
            knxlink_api::Error::Store { message } => CoreError::Store { message },
            knxlink_api::Error::ObjectNotFound { id } => CoreError::Store {
                message: format!("object not found: {id}"),
            },
            knxlink_api::Error::InvalidPath { name } => CoreError::Config {
                message: format!("invalid project file name '{name}'"),
            },
            knxlink_api::Error::Io(e) => CoreError::Store {
                message: format!("IO error: {e}"),
            },
            knxlink_api::Error::Parse { message } => CoreError::ParseFailure { message },
            knxlink_api::Error::Serialization(e) => {
                CoreError::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}
