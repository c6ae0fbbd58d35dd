// ── Project parser contract ──
//
// An ETS export is a loosely typed document. Parsers turn it into the
// validated structure below once, so the import walkers never check for
// optional fields themselves.

use std::path::Path;

use serde::Serialize;

use crate::error::Error;

/// A parsed ETS project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Project {
    pub info: ProjectInfo,
    /// Device topology, used for access-flag aggregation.
    pub areas: Vec<Area>,
    /// One group-address tree per installation, in document order.
    pub installations: Vec<Installation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectInfo {
    pub name: Option<String>,
    /// Declared addressing style name (`Free`, `TwoLevel`, `ThreeLevel`).
    pub group_address_style: Option<String>,
}

// ── Topology ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Area {
    pub name: Option<String>,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Line {
    pub name: Option<String>,
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Device {
    pub name: Option<String>,
    pub com_object_refs: Vec<ComObjectRef>,
}

/// A device-level communication object bound to group addresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ComObjectRef {
    /// `false` only when the project marks the reference inactive.
    pub active: bool,
    pub read: bool,
    pub write: bool,
    pub transmit: bool,
    pub update: bool,
    pub send: Vec<ConnectorTarget>,
    pub receive: Vec<ConnectorTarget>,
}

impl Default for ComObjectRef {
    fn default() -> Self {
        Self {
            active: true,
            read: false,
            write: false,
            transmit: false,
            update: false,
            send: Vec::new(),
            receive: Vec::new(),
        }
    }
}

/// One send or receive connector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectorTarget {
    /// Id of the referenced group address, if the connector has one.
    pub group_address_ref: Option<String>,
}

impl ConnectorTarget {
    pub fn to(group_address_id: impl Into<String>) -> Self {
        Self {
            group_address_ref: Some(group_address_id.into()),
        }
    }
}

// ── Group address trees ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Installation {
    pub name: Option<String>,
    pub ranges: Vec<GroupRange>,
}

/// A group range: nested ranges and/or group address leaves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupRange {
    pub name: Option<String>,
    pub ranges: Vec<GroupRange>,
    pub addresses: Vec<GroupAddressRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupAddressRecord {
    /// Project-internal id, the target of connector back-references.
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Raw numeric address as stored in the project.
    pub address: u32,
    /// Project type identifier (`DPT-N` / `DPST-N-M`), if any.
    pub dpt: Option<String>,
}

// ── Parser ──────────────────────────────────────────────────────────

/// Turns raw project file bytes into a [`Project`].
///
/// Implementations report every schema problem as [`Error::Parse`].
pub trait ProjectParser: Send + Sync {
    /// `work_dir` is a scratch directory parsers may unpack archives into.
    fn parse(&self, file_name: &str, bytes: &[u8], work_dir: &Path) -> Result<Project, Error>;
}
