// Project file parsers shipped with the core.

#[cfg(feature = "json-project")]
pub mod json;

#[cfg(feature = "json-project")]
pub use json::JsonProjectParser;
