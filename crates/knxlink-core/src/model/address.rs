// ── Group address codec ──
//
// A group address is a plain 16-bit value. The three textual styles
// split the bits differently, so decoding is only meaningful in the
// style the text was encoded with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Textual rendering style of a group address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressStyle {
    /// Raw decimal value, e.g. `2049`.
    Free,
    /// `main/sub` with 5/11 bits, e.g. `1/1`.
    TwoLevel,
    /// `main/middle/sub` with 5/3/8 bits, e.g. `1/0/1`.
    #[default]
    ThreeLevel,
}

impl AddressStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::TwoLevel => "TwoLevel",
            Self::ThreeLevel => "ThreeLevel",
        }
    }

    /// Lenient lookup used for project-declared styles: anything
    /// unrecognized falls back to [`AddressStyle::ThreeLevel`].
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for AddressStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "free" => Ok(Self::Free),
            "twolevel" => Ok(Self::TwoLevel),
            "threelevel" => Ok(Self::ThreeLevel),
            _ => Err(CoreError::Config {
                message: format!(
                    "unknown address style '{s}' (expected Free, TwoLevel or ThreeLevel)"
                ),
            }),
        }
    }
}

/// Caller-side choice of addressing style for an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleOverride {
    /// Use the style the project declares.
    #[default]
    Auto,
    /// Force a style regardless of the project.
    Fixed(AddressStyle),
}

impl StyleOverride {
    /// Resolve against the project's declared style.
    pub fn resolve(self, declared: Option<AddressStyle>) -> AddressStyle {
        match self {
            Self::Auto => declared.unwrap_or_default(),
            Self::Fixed(style) => style,
        }
    }
}

impl FromStr for StyleOverride {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.trim().parse().map(Self::Fixed)
    }
}

impl fmt::Display for StyleOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(style) => style.fmt(f),
        }
    }
}

// ── GroupAddress ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupAddress(u16);

impl GroupAddress {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Build from a wider integer, keeping only the low 16 bits.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub const fn from_raw(raw: u32) -> Self {
        Self((raw & 0xFFFF) as u16)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub fn render(self, style: AddressStyle) -> String {
        let v = self.0;
        match style {
            AddressStyle::Free => v.to_string(),
            AddressStyle::TwoLevel => format!("{}/{}", v >> 11, v & 0x07FF),
            AddressStyle::ThreeLevel => {
                format!("{}/{}/{}", v >> 11, (v >> 8) & 0x07, v & 0x00FF)
            }
        }
    }

    pub fn parse(text: &str, style: AddressStyle) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidAddress {
            input: text.into(),
            style: style.to_string(),
        };
        let parts: Vec<&str> = text.trim().split('/').collect();
        let field = |idx: usize, max: u16| -> Result<u16, CoreError> {
            let value: u16 = parts
                .get(idx)
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(invalid)?;
            if value > max {
                return Err(invalid());
            }
            Ok(value)
        };

        match (style, parts.len()) {
            (AddressStyle::Free, 1) => Ok(Self(field(0, u16::MAX)?)),
            (AddressStyle::TwoLevel, 2) => {
                let main = field(0, 0x1F)?;
                let sub = field(1, 0x07FF)?;
                Ok(Self((main << 11) | sub))
            }
            (AddressStyle::ThreeLevel, 3) => {
                let main = field(0, 0x1F)?;
                let middle = field(1, 0x07)?;
                let sub = field(2, 0xFF)?;
                Ok(Self((main << 11) | (middle << 8) | sub))
            }
            _ => Err(invalid()),
        }
    }
}

impl From<u16> for GroupAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Render a numeric address in `style`; out-of-range input wraps to 16 bits.
pub fn encode_address(raw: u32, style: AddressStyle) -> String {
    GroupAddress::from_raw(raw).render(style)
}

/// Inverse of [`encode_address`] for the same style.
pub fn decode_address(text: &str, style: AddressStyle) -> Result<GroupAddress, CoreError> {
    GroupAddress::parse(text, style)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_styles() {
        let ga = GroupAddress::new(0x0B90); // 1/3/144 = 1/912
        assert_eq!(ga.render(AddressStyle::Free), "2960");
        assert_eq!(ga.render(AddressStyle::TwoLevel), "1/912");
        assert_eq!(ga.render(AddressStyle::ThreeLevel), "1/3/144");
    }

    #[test]
    fn encode_masks_to_sixteen_bits() {
        assert_eq!(encode_address(0x1_0001, AddressStyle::ThreeLevel), "0/0/1");
        assert_eq!(encode_address(u32::MAX, AddressStyle::ThreeLevel), "31/7/255");
    }

    #[test]
    fn round_trip_is_lossless_for_every_address() {
        for style in [AddressStyle::TwoLevel, AddressStyle::ThreeLevel, AddressStyle::Free] {
            for raw in 0..=u16::MAX {
                let text = encode_address(u32::from(raw), style);
                assert_eq!(decode_address(&text, style).unwrap().raw(), raw, "{style} {text}");
            }
        }
    }

    #[test]
    fn two_level_scenario_address() {
        let ga = decode_address("3/400", AddressStyle::TwoLevel).unwrap();
        assert_eq!(ga.raw(), (3 << 11) | 400);
        assert_eq!(ga.render(AddressStyle::TwoLevel), "3/400");
    }

    #[test]
    fn decode_rejects_out_of_range_and_wrong_shape() {
        assert!(decode_address("32/0/0", AddressStyle::ThreeLevel).is_err());
        assert!(decode_address("0/8/0", AddressStyle::ThreeLevel).is_err());
        assert!(decode_address("1/0/256", AddressStyle::ThreeLevel).is_err());
        assert!(decode_address("1/2048", AddressStyle::TwoLevel).is_err());
        assert!(decode_address("1/0", AddressStyle::ThreeLevel).is_err());
        assert!(decode_address("1/0/0", AddressStyle::TwoLevel).is_err());
        assert!(decode_address("abc", AddressStyle::Free).is_err());
        assert!(decode_address("", AddressStyle::Free).is_err());
    }

    #[test]
    fn style_names_are_lenient_but_explicit_parse_is_strict() {
        assert_eq!(AddressStyle::from_name("TwoLevel"), AddressStyle::TwoLevel);
        assert_eq!(AddressStyle::from_name("two-level"), AddressStyle::TwoLevel);
        assert_eq!(AddressStyle::from_name("Free"), AddressStyle::Free);
        assert_eq!(AddressStyle::from_name("Whatever"), AddressStyle::ThreeLevel);
        assert!("Whatever".parse::<AddressStyle>().is_err());
    }

    #[test]
    fn style_override_resolution() {
        let auto: StyleOverride = "auto".parse().unwrap();
        assert_eq!(auto.resolve(Some(AddressStyle::TwoLevel)), AddressStyle::TwoLevel);
        assert_eq!(auto.resolve(None), AddressStyle::ThreeLevel);

        let forced: StyleOverride = "free".parse().unwrap();
        assert_eq!(forced.resolve(Some(AddressStyle::TwoLevel)), AddressStyle::Free);
    }
}
