// ── Import entries and runtime mapping records ──

use serde::Serialize;

use super::address::GroupAddress;
use super::dpt::TypeCode;
use super::flags::AccessFlags;

/// Reserved store namespace every group address entry lives under.
pub const ENTRY_NAMESPACE: &str = "ga";

/// One row of the flattened import result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportEntry {
    /// Stable store id, see [`entry_id`].
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Group range names from the tree root down to the parent range.
    pub path: Vec<String>,
    /// Address rendered in the import's resolved style.
    pub address: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_code: Option<TypeCode>,
    pub flags: AccessFlags,
}

/// Runtime projection of a persisted entry, consumed by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRecord {
    pub id: String,
    pub address: GroupAddress,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_code: Option<TypeCode>,
    pub flags: AccessFlags,
}

/// Reduce a path segment to `[A-Za-z0-9_-]`, `_` as separator.
///
/// Never returns an empty string.
pub fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Store ids of the channels above an entry, outermost first.
pub fn channel_ids(path: &[String]) -> Vec<String> {
    let mut id = ENTRY_NAMESPACE.to_owned();
    path.iter()
        .map(|segment| {
            id.push('.');
            id.push_str(&sanitize_segment(segment));
            id.clone()
        })
        .collect()
}

/// `ga.<segment>...<address>` with every part sanitized.
pub fn entry_id(path: &[String], rendered_address: &str) -> String {
    let mut id = channel_ids(path).pop().unwrap_or_else(|| ENTRY_NAMESPACE.to_owned());
    id.push('.');
    id.push_str(&sanitize_segment(rendered_address));
    id
}

/// Whether `id` lies in the entry namespace.
pub fn is_entry_id(id: &str) -> bool {
    id.strip_prefix(ENTRY_NAMESPACE)
        .is_some_and(|rest| rest.starts_with('.'))
}
