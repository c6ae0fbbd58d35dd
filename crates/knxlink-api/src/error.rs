use thiserror::Error;

/// Top-level error type for the `knxlink-api` crate.
///
/// Covers every failure a collaborator can report: bus transport,
/// state store and file storage. `knxlink-core` maps these into its own
/// taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Bus transport ───────────────────────────────────────────────
    /// The transport rejected or failed a telegram.
    #[error("Bus transport error: {message}")]
    Bus { message: String },

    /// The operation needs a live bus connection.
    #[error("Bus connection is not established")]
    NotConnected,

    /// The transport cannot build a datapoint for this address/type.
    #[error("Cannot create datapoint for {address}: {reason}")]
    Datapoint { address: u16, reason: String },

    // ── State store ─────────────────────────────────────────────────
    /// The store refused a read or write.
    #[error("State store error: {message}")]
    Store { message: String },

    /// Extend was called on an object that does not exist.
    #[error("Object not found: {id}")]
    ObjectNotFound { id: String },

    // ── File storage ────────────────────────────────────────────────
    /// A logical file name tried to escape its namespace.
    #[error("Invalid file name: {name}")]
    InvalidPath { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Project parser ──────────────────────────────────────────────
    /// The project file is malformed or uses an unsupported schema.
    #[error("Project parse error: {message}")]
    Parse { message: String },

    // ── Data ────────────────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
