pub mod address;
pub mod dpt;
pub mod entry;
pub mod flags;

pub use address::{AddressStyle, GroupAddress, StyleOverride, decode_address, encode_address};
pub use dpt::{TypeCode, ValueKind, major_of};
pub use entry::{ENTRY_NAMESPACE, ImportEntry, MappingRecord, entry_id, sanitize_segment};
pub use flags::AccessFlags;
