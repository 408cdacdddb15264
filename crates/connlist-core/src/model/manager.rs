// ── Connection manager state ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Global connectivity state of the connection manager.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ManagerState {
    Offline,
    #[default]
    Idle,
    Ready,
    Online,
}

/// Manager-wide properties, independent of any one technology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manager {
    pub state: ManagerState,
    /// All radios held off by the user.
    pub offline_mode: bool,
    /// Technology carrying the default route, if anything is connected.
    pub default_technology: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn state_parses_like_the_backend_reports_it() {
        assert_eq!("online".parse::<ManagerState>().unwrap(), ManagerState::Online);
        assert_eq!(ManagerState::Offline.to_string(), "offline");
        assert_eq!(
            serde_json::to_string(&Manager::default()).unwrap(),
            r#"{"state":"idle","offline_mode":false,"default_technology":null}"#
        );
    }
}
