// JSON project export parser
//
// Reads the JSON rendering of an ETS project. Raw serde types mirror the
// document; `into_project` validates them into `knxlink_api::Project`.
// Fields use `#[serde(default)]` liberally because exports differ in
// which keys they emit.

use std::path::Path;

use knxlink_api::{
    Area, ComObjectRef, ConnectorTarget, Device, Error, GroupAddressRecord, GroupRange,
    Installation, Line, Project, ProjectInfo, ProjectParser,
};
use serde::Deserialize;
use tracing::debug;

/// [`ProjectParser`] for JSON project exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProjectParser;

impl JsonProjectParser {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectParser for JsonProjectParser {
    fn parse(&self, file_name: &str, bytes: &[u8], _work_dir: &Path) -> Result<Project, Error> {
        let raw: RawProject = serde_json::from_slice(bytes).map_err(|e| Error::Parse {
            message: format!("{file_name}: {e}"),
        })?;
        let project = raw.into_project().map_err(|message| Error::Parse {
            message: format!("{file_name}: {message}"),
        })?;
        debug!(
            file = file_name,
            areas = project.areas.len(),
            installations = project.installations.len(),
            "project parsed"
        );
        Ok(project)
    }
}

// ── Raw document ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProject {
    #[serde(default)]
    project_information: RawInfo,
    #[serde(default)]
    topology: RawTopology,
    #[serde(default)]
    group_addresses: Vec<RawInstallation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    group_address_style: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTopology {
    #[serde(default)]
    areas: Vec<RawArea>,
}

#[derive(Debug, Deserialize)]
struct RawArea {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    lines: Vec<RawLine>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    devices: Vec<RawDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDevice {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    communication_object_references: Vec<RawComObjectRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
struct RawComObjectRef {
    /// Absent means active; only an explicit `false` disables.
    #[serde(default)]
    is_active: Option<bool>,
    /// Older spelling of `isActive`.
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    read_flag: bool,
    #[serde(default)]
    write_flag: bool,
    #[serde(default)]
    transmit_flag: bool,
    #[serde(default)]
    update_flag: bool,
    #[serde(default)]
    connectors: RawConnectors,
}

#[derive(Debug, Default, Deserialize)]
struct RawConnectors {
    #[serde(default)]
    send: Vec<RawConnector>,
    #[serde(default)]
    receive: Vec<RawConnector>,
}

/// Older exports name the receive back-reference `refId`. Some carry
/// both spellings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConnector {
    #[serde(default)]
    group_address_ref_id: Option<String>,
    #[serde(default)]
    ref_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstallation {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    group_ranges: Vec<RawGroupRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroupRange {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    group_ranges: Vec<RawGroupRange>,
    #[serde(default)]
    group_addresses: Vec<RawGroupAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroupAddress {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    address: RawAddress,
    #[serde(default)]
    datapoint_type: Option<String>,
    #[serde(default)]
    dpt: Option<String>,
}

/// Exports carry the raw address either as a number or a decimal string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Number(u32),
    Text(String),
}

// ── Validation ───────────────────────────────────────────────────────

impl RawProject {
    fn into_project(self) -> Result<Project, String> {
        let installations = self
            .group_addresses
            .into_iter()
            .map(|i| -> Result<Installation, String> {
                Ok(Installation {
                    name: i.name,
                    ranges: convert_ranges(i.group_ranges)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Project {
            info: ProjectInfo {
                name: self.project_information.name,
                group_address_style: self.project_information.group_address_style,
            },
            areas: self.topology.areas.into_iter().map(convert_area).collect(),
            installations,
        })
    }
}

fn convert_area(area: RawArea) -> Area {
    Area {
        name: area.name,
        lines: area
            .lines
            .into_iter()
            .map(|line| Line {
                name: line.name,
                devices: line.devices.into_iter().map(convert_device).collect(),
            })
            .collect(),
    }
}

fn convert_device(device: RawDevice) -> Device {
    Device {
        name: device.name,
        com_object_refs: device
            .communication_object_references
            .into_iter()
            .map(|r| ComObjectRef {
                active: r.is_active.or(r.active).unwrap_or(true),
                read: r.read_flag,
                write: r.write_flag,
                transmit: r.transmit_flag,
                update: r.update_flag,
                send: convert_connectors(r.connectors.send),
                receive: convert_connectors(r.connectors.receive),
            })
            .collect(),
    }
}

fn convert_connectors(raw: Vec<RawConnector>) -> Vec<ConnectorTarget> {
    raw.into_iter()
        .map(|c| ConnectorTarget {
            group_address_ref: non_empty(c.group_address_ref_id).or_else(|| non_empty(c.ref_id)),
        })
        .collect()
}

fn non_empty(id: Option<String>) -> Option<String> {
    id.filter(|id| !id.is_empty())
}

fn convert_ranges(raw: Vec<RawGroupRange>) -> Result<Vec<GroupRange>, String> {
    raw.into_iter()
        .map(|range| -> Result<GroupRange, String> {
            Ok(GroupRange {
                name: range.name,
                ranges: convert_ranges(range.group_ranges)?,
                addresses: range
                    .group_addresses
                    .into_iter()
                    .map(convert_address)
                    .collect::<Result<Vec<_>, _>>()?,
            })
        })
        .collect()
}

fn convert_address(raw: RawGroupAddress) -> Result<GroupAddressRecord, String> {
    let address = match raw.address {
        RawAddress::Number(n) => n,
        RawAddress::Text(text) => text.trim().parse().map_err(|_| {
            format!("group address '{}' has non-numeric address '{text}'", raw.name)
        })?,
    };
    Ok(GroupAddressRecord {
        id: raw.id,
        name: raw.name,
        description: raw.description.filter(|d| !d.trim().is_empty()),
        address,
        dpt: raw.datapoint_type.or(raw.dpt),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Project, Error> {
        JsonProjectParser::new().parse("test.json", json.as_bytes(), Path::new("."))
    }

    #[test]
    fn parses_both_receive_reference_names() {
        let project = parse(
            r#"{
              "topology": { "areas": [ { "lines": [ { "devices": [ {
                "communicationObjectReferences": [ {
                  "readFlag": true,
                  "connectors": {
                    "send": [ { "groupAddressRefId": "GA-1" } ],
                    "receive": [ { "refId": "GA-2" }, { "groupAddressRefId": "GA-3" }, {} ]
                  }
                } ]
              } ] } ] } ] }
            }"#,
        )
        .unwrap();

        let com_ref = &project.areas[0].lines[0].devices[0].com_object_refs[0];
        assert!(com_ref.active);
        assert!(com_ref.read);
        assert_eq!(com_ref.send, vec![ConnectorTarget::to("GA-1")]);
        assert_eq!(
            com_ref.receive,
            vec![
                ConnectorTarget::to("GA-2"),
                ConnectorTarget::to("GA-3"),
                ConnectorTarget::default()
            ]
        );
    }

    #[test]
    fn both_spellings_on_one_object_are_merged() {
        let project = parse(
            r#"{
              "topology": { "areas": [ { "lines": [ { "devices": [ {
                "communicationObjectReferences": [ {
                  "isActive": false,
                  "active": true,
                  "connectors": {
                    "receive": [
                      { "groupAddressRefId": "GA-1", "refId": "GA-1" },
                      { "groupAddressRefId": "", "refId": "GA-2" },
                      { "groupAddressRefId": "GA-3", "refId": "GA-9" }
                    ]
                  }
                } ]
              } ] } ] } ] },
              "groupAddresses": [ { "groupRanges": [ { "groupAddresses": [
                { "id": "GA-1", "name": "x", "address": 1, "datapointType": "DPST-1-1", "dpt": "DPT-5" },
                { "id": "GA-2", "name": "y", "address": 2, "dpt": "DPT-9" }
              ] } ] } ]
            }"#,
        )
        .unwrap();

        let com_ref = &project.areas[0].lines[0].devices[0].com_object_refs[0];
        assert!(!com_ref.active);
        assert_eq!(
            com_ref.receive,
            vec![
                ConnectorTarget::to("GA-1"),
                ConnectorTarget::to("GA-2"),
                ConnectorTarget::to("GA-3")
            ]
        );
        let addresses = &project.installations[0].ranges[0].addresses;
        assert_eq!(addresses[0].dpt.as_deref(), Some("DPST-1-1"));
        assert_eq!(addresses[1].dpt.as_deref(), Some("DPT-9"));
    }

    #[test]
    fn explicit_inactive_flag_is_kept() {
        let project = parse(
            r#"{ "topology": { "areas": [ { "lines": [ { "devices": [ {
                "communicationObjectReferences": [ { "isActive": false } ]
            } ] } ] } ] } }"#,
        )
        .unwrap();
        assert!(!project.areas[0].lines[0].devices[0].com_object_refs[0].active);
    }

    #[test]
    fn parses_group_ranges_and_addresses() {
        let project = parse(
            r#"{
              "projectInformation": { "name": "Home", "groupAddressStyle": "TwoLevel" },
              "groupAddresses": [ { "name": "Main", "groupRanges": [ {
                "name": "Lights",
                "groupAddresses": [
                  { "id": "GA-1", "name": "Hall", "address": 2049, "datapointType": "DPST-1-1" },
                  { "id": "GA-2", "name": "Desk", "address": "2050", "description": " " }
                ]
              } ] } ]
            }"#,
        )
        .unwrap();

        assert_eq!(project.info.group_address_style.as_deref(), Some("TwoLevel"));
        let range = &project.installations[0].ranges[0];
        assert_eq!(range.name.as_deref(), Some("Lights"));
        assert_eq!(range.addresses[0].address, 2049);
        assert_eq!(range.addresses[0].dpt.as_deref(), Some("DPST-1-1"));
        assert_eq!(range.addresses[1].address, 2050);
        assert_eq!(range.addresses[1].description, None);
    }

    #[test]
    fn malformed_documents_are_parse_errors() {
        assert!(matches!(parse("{ not json"), Err(Error::Parse { .. })));
        let bad_address = r#"{ "groupAddresses": [ { "groupRanges": [ {
            "groupAddresses": [ { "id": "x", "name": "x", "address": "1/2/3" } ] } ] } ] }"#;
        assert!(matches!(parse(bad_address), Err(Error::Parse { .. })));
    }
}
