mod mapping;

pub use mapping::{MappingSnapshot, MappingStore, record_from_object};
