// knxlink-api: Contracts for the collaborators around the bridge core.
//
// The KNX bus transport, the persisted object/state store and the file
// storage are owned by the host, and so is the project file parser. This
// crate pins down the interface the core talks to, the validated project
// model a parser yields, plus reference adapters (in-memory repository,
// directory-backed file store, loopback bus) used by the CLI and tests.

pub mod bus;
pub mod error;
pub mod files;
pub mod loopback;
pub mod memory;
pub mod project;
pub mod store;

pub use bus::{
    AddressedChange, BusConnection, BusEvent, BusValue, ChangeSink, Datapoint, ValueChange,
};
pub use error::Error;
pub use files::{DirFileStore, FileStore};
pub use loopback::{LoopbackBus, Telegram};
pub use memory::{MemoryRepository, RepositorySnapshot};
pub use project::{
    Area, ComObjectRef, ConnectorTarget, Device, GroupAddressRecord, GroupRange, Installation, Line,
    Project, ProjectInfo, ProjectParser,
};
pub use store::{ObjectCommon, ObjectKind, ObjectPatch, State, StateChange, StateRepository, StoredObject};
