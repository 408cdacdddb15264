// ── Command API ──
//
// Mutations a projection forwards to the backend. They are fire-and-forget
// from the projection's point of view: completion or failure comes back
// later as backend events, never as a return value.

use secrecy::SecretString;

use crate::model::ObjectPath;

/// All write operations a projection can request.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Service operations ───────────────────────────────────────────
    ConnectService {
        path: ObjectPath,
        passphrase: Option<SecretString>,
    },
    DisconnectService {
        path: ObjectPath,
    },
    SetServiceProperty {
        path: ObjectPath,
        name: String,
        value: serde_json::Value,
    },

    // ── Technology operations ────────────────────────────────────────
    SetPowered {
        technology: String,
        powered: bool,
    },
    RequestScan {
        technology: String,
    },

    // ── Manager operations ───────────────────────────────────────────
    SetOfflineMode {
        enabled: bool,
    },
}

impl Command {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectService { .. } => "connect_service",
            Self::DisconnectService { .. } => "disconnect_service",
            Self::SetServiceProperty { .. } => "set_service_property",
            Self::SetPowered { .. } => "set_powered",
            Self::RequestScan { .. } => "request_scan",
            Self::SetOfflineMode { .. } => "set_offline_mode",
        }
    }
}
