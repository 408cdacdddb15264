// ── Technology domain types ──

use serde::{Deserialize, Serialize};

use super::object_path::ObjectPath;

/// A radio or link technology known to the backend (wifi, ethernet, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    pub path: ObjectPath,
    /// Category key services refer to (`wifi`, `ethernet`, ...).
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub powered: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub tethering: bool,
}

impl Technology {
    pub fn new(kind: &str) -> Self {
        Self {
            path: ObjectPath::new(format!("/net/connman/technology/{kind}")),
            kind: kind.to_owned(),
            name: kind.to_owned(),
            powered: false,
            connected: false,
            tethering: false,
        }
    }

    pub fn with_powered(mut self, powered: bool) -> Self {
        self.powered = powered;
        self
    }

    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }
}
