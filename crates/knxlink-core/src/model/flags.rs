use serde::{Deserialize, Serialize};

/// Communication-object access flags of a group address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct AccessFlags {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub transmit: bool,
    #[serde(default)]
    pub update: bool,
}

impl AccessFlags {
    pub const fn new(read: bool, write: bool, transmit: bool, update: bool) -> Self {
        Self {
            read,
            write,
            transmit,
            update,
        }
    }

    /// Flags assumed for a group address no communication object
    /// references: transmit only.
    pub const fn unreferenced() -> Self {
        Self::new(false, false, true, false)
    }

    /// OR `other` into `self`. Never clears a flag.
    pub fn merge(&mut self, other: Self) {
        self.read |= other.read;
        self.write |= other.write;
        self.transmit |= other.transmit;
        self.update |= other.update;
    }

    /// Short `RWTU` rendering, `-` for unset flags.
    pub fn code(self) -> String {
        [
            (self.read, 'R'),
            (self.write, 'W'),
            (self.transmit, 'T'),
            (self.update, 'U'),
        ]
        .iter()
        .map(|&(set, c)| if set { c } else { '-' })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_monotone() {
        let mut flags = AccessFlags::new(true, false, false, false);
        flags.merge(AccessFlags::new(false, true, false, false));
        assert_eq!(flags, AccessFlags::new(true, true, false, false));

        flags.merge(AccessFlags::default());
        assert_eq!(flags, AccessFlags::new(true, true, false, false));
    }

    #[test]
    fn code_rendering() {
        assert_eq!(AccessFlags::unreferenced().code(), "--T-");
        assert_eq!(AccessFlags::new(true, true, true, true).code(), "RWTU");
    }
}
