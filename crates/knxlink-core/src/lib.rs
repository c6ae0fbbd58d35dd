//! ETS project import and KNX bus ↔ state store synchronization.
//!
//! This crate owns the bridge logic between the collaborators defined in
//! `knxlink-api`:
//!
//! - **[`ImportEngine`]**: turns a project file into a flat list of
//!   [`ImportEntry`] values. Group-range trees are walked depth-first,
//!   access flags are OR-merged across the topology, addresses are
//!   rendered in the project's (or the configured) style.
//!   [`persist_entries`] writes the result into a `StateRepository`.
//!
//! - **[`MappingStore`]**: in-memory index of [`MappingRecord`]s rebuilt
//!   in full from the persisted `ga.` objects. Readers always see a
//!   complete snapshot.
//!
//! - **[`SyncEngine`]**: one background task binding every record to a
//!   bus datapoint, copying bus values into the store and turning store
//!   commands into rate-limited bus telegrams through a [`TxQueue`].
//!
//! - **Domain model** ([`model`]): [`GroupAddress`] with its three
//!   renderings, [`TypeCode`], [`AccessFlags`].

pub mod config;
pub mod error;
pub mod import;
pub mod model;
pub mod project;
pub mod store;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BridgeConfig, ImportConfig, SyncConfig};
pub use error::CoreError;
pub use import::{ImportEngine, ImportOutcome, PersistReport, content_hash, persist_entries};
pub use store::{MappingSnapshot, MappingStore};
pub use sync::{ConnectionState, Dispatch, SyncEngine, TxJob, TxQueue};

pub use model::{
    AccessFlags, AddressStyle, GroupAddress, ImportEntry, MappingRecord, StyleOverride, TypeCode,
    ValueKind, decode_address, encode_address,
};
