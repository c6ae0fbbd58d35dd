// ── Access flag aggregation over the device topology ──

use std::collections::HashMap;

use knxlink_api::{Area, ComObjectRef};
use tracing::trace;

use crate::model::AccessFlags;

/// Accumulates OR-merged flags per group address id.
#[derive(Debug, Default)]
pub struct FlagAggregator {
    flags: HashMap<String, AccessFlags>,
}

impl FlagAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in every communication object reference of the topology.
    pub fn add_topology(&mut self, areas: &[Area]) {
        let refs = areas
            .iter()
            .flat_map(|area| &area.lines)
            .flat_map(|line| &line.devices)
            .flat_map(|device| &device.com_object_refs);
        for com_ref in refs {
            self.add_reference(com_ref);
        }
    }

    /// Fold in one reference. Inactive references contribute nothing.
    pub fn add_reference(&mut self, com_ref: &ComObjectRef) {
        if !com_ref.active {
            return;
        }
        let flags = AccessFlags::new(com_ref.read, com_ref.write, com_ref.transmit, com_ref.update);

        let targets = com_ref.send.iter().chain(&com_ref.receive);
        for target in targets {
            let Some(id) = target.group_address_ref.as_deref() else {
                trace!("connector without group address reference, skipped");
                continue;
            };
            self.flags.entry(id.to_owned()).or_default().merge(flags);
        }
    }

    pub fn get(&self, group_address_id: &str) -> Option<AccessFlags> {
        self.flags.get(group_address_id).copied()
    }

    /// Flags for `group_address_id`, or the unreferenced default.
    pub fn effective(&self, group_address_id: &str) -> AccessFlags {
        self.get(group_address_id)
            .unwrap_or_else(AccessFlags::unreferenced)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Aggregate the flags of a whole topology.
pub fn aggregate_flags(areas: &[Area]) -> FlagAggregator {
    let mut aggregator = FlagAggregator::new();
    aggregator.add_topology(areas);
    aggregator
}
