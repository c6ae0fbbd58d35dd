// ── Group range tree walker ──
//
// Depth-first over nested group ranges. Within a range its own address
// leaves come first, then its child ranges, each in document order.

use knxlink_api::{GroupAddressRecord, GroupRange, Installation};

/// A group address leaf together with the range names above it.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkedAddress<'a> {
    pub path: Vec<String>,
    pub record: &'a GroupAddressRecord,
}

/// Walk one group range tree.
pub fn walk_tree(ranges: &[GroupRange]) -> Vec<WalkedAddress<'_>> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    for range in ranges {
        walk_range(range, &mut path, &mut out);
    }
    out
}

/// Walk every installation's tree and concatenate the results.
pub fn walk_installations(installations: &[Installation]) -> Vec<WalkedAddress<'_>> {
    installations
        .iter()
        .flat_map(|installation| walk_tree(&installation.ranges))
        .collect()
}

fn walk_range<'a>(range: &'a GroupRange, path: &mut Vec<String>, out: &mut Vec<WalkedAddress<'a>>) {
    let segment = range
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if let Some(name) = segment {
        path.push(name.to_owned());
    }

    out.extend(range.addresses.iter().map(|record| WalkedAddress {
        path: path.clone(),
        record,
    }));
    for child in &range.ranges {
        walk_range(child, path, out);
    }

    if segment.is_some() {
        path.pop();
    }
}
