// ── Core identity type ──
//
// ObjectPath is the identity of every backend entity. Two records with
// the same path are the same service, whatever their attributes say.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a backend entity (e.g. `/net/connman/service/wifi_0a1b_managed_psk`).
///
/// Normalized on construction: surrounding whitespace and any trailing
/// `/` are stripped, so `"/a/b/"` and `"/a/b"` name the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let stripped = trimmed.trim_end_matches('/');
        // A path of nothing but slashes is the root.
        let normalized = if stripped.is_empty() && !trimmed.is_empty() {
            "/"
        } else {
            stripped
        };
        Self(normalized.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, the backend's short service identifier.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for ObjectPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ObjectPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<ObjectPath> for String {
    fn from(p: ObjectPath) -> Self {
        p.0
    }
}
