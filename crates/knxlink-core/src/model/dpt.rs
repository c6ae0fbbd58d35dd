// ── Datapoint type codes ──
//
// ETS identifies types as `DPT-<major>` / `DPST-<major>-<minor>`; the bus
// side wants dotted `major[.minor]` codes with a 3-digit minor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dotted `major[.minor]` datapoint type code, e.g. `1.001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCode(String);

impl TypeCode {
    /// Normalize a project type identifier.
    ///
    /// Accepts `N`, `N.M`, `DPT-N` and `DPST-N-M`. Every other shape
    /// yields `None`: a missing type is a normal state, not an error.
    pub fn normalize(project_id: &str) -> Option<Self> {
        let id = project_id.trim();
        if is_dotted_code(id) {
            return Some(Self(id.to_owned()));
        }

        let parts: Vec<&str> = id.split('-').collect();
        match parts.as_slice() {
            [prefix, major] if prefix.eq_ignore_ascii_case("DPT") && is_digits(major) => {
                Some(Self((*major).to_owned()))
            }
            [prefix, major, minor]
                if prefix.eq_ignore_ascii_case("DPST") && is_digits(major) && is_digits(minor) =>
            {
                Some(Self(format!("{major}.{minor:0>3}")))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Major type number, `None` if it does not fit a `u16`.
    pub fn major(&self) -> Option<u16> {
        self.0.split('.').next()?.parse().ok()
    }

    pub fn value_kind(&self) -> ValueKind {
        ValueKind::from_major(self.major())
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Major type of an optional type code.
pub fn major_of(type_code: Option<&TypeCode>) -> Option<u16> {
    type_code.and_then(TypeCode::major)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_dotted_code(s: &str) -> bool {
    match s.split_once('.') {
        Some((major, minor)) => is_digits(major) && is_digits(minor),
        None => is_digits(s),
    }
}

// ── ValueKind ───────────────────────────────────────────────────────

/// Coarse value family derived from the major type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// Major 1: switches, enables, alarms.
    Boolean,
    /// Major 16: 14-byte character strings.
    Text,
    /// Major 19: date and time.
    Date,
    /// Everything else, including unknown types.
    Number,
}

impl ValueKind {
    pub fn from_major(major: Option<u16>) -> Self {
        match major {
            Some(1) => Self::Boolean,
            Some(16) => Self::Text,
            Some(19) => Self::Date,
            _ => Self::Number,
        }
    }

    /// Value type name used for state objects in the store.
    pub fn store_type(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Text | Self::Date => "string",
            Self::Number => "number",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn norm(id: &str) -> Option<String> {
        TypeCode::normalize(id).map(|t| t.as_str().to_owned())
    }

    #[test]
    fn normalizes_project_identifiers() {
        assert_eq!(norm("DPST-1-1").as_deref(), Some("1.001"));
        assert_eq!(norm("DPST-9-1").as_deref(), Some("9.001"));
        assert_eq!(norm("DPST-232-600").as_deref(), Some("232.600"));
        assert_eq!(norm("DPT-5").as_deref(), Some("5"));
    }

    #[test]
    fn keeps_already_normalized_codes() {
        assert_eq!(norm("1.001").as_deref(), Some("1.001"));
        assert_eq!(norm("14").as_deref(), Some("14"));
    }

    #[test]
    fn rejects_other_shapes() {
        assert_eq!(norm("not-a-dpt"), None);
        assert_eq!(norm(""), None);
        assert_eq!(norm("DPT-"), None);
        assert_eq!(norm("DPST-1"), None);
        assert_eq!(norm("DPST-1-x"), None);
        assert_eq!(norm("1."), None);
    }

    #[test]
    fn major_extraction() {
        assert_eq!(TypeCode::normalize("DPST-16-0").unwrap().major(), Some(16));
        assert_eq!(major_of(None), None);
        let code = TypeCode::normalize("9.001");
        assert_eq!(major_of(code.as_ref()), Some(9));
    }

    #[test]
    fn value_kind_by_major() {
        assert_eq!(ValueKind::from_major(Some(1)), ValueKind::Boolean);
        assert_eq!(ValueKind::from_major(Some(16)), ValueKind::Text);
        assert_eq!(ValueKind::from_major(Some(19)), ValueKind::Date);
        assert_eq!(ValueKind::from_major(Some(9)), ValueKind::Number);
        assert_eq!(ValueKind::from_major(None), ValueKind::Number);
        assert_eq!(ValueKind::Date.store_type(), "string");
    }
}
