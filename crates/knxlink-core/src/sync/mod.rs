// ── Runtime synchronization ──
//
// Bus ↔ store copy protocol: the engine task, its transmit queue and the
// value coercion between store JSON and bus values.

pub mod coerce;
pub mod engine;
pub mod queue;

pub use coerce::{bus_to_store, store_to_bus};
pub use engine::{ConnectionState, Dispatch, SyncEngine};
pub use queue::{TxJob, TxQueue};
