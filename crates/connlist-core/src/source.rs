// ── Entity source ──
//
// The seam between projections and whatever talks to the connection
// manager. A source answers snapshot queries, broadcasts change events
// and accepts commands; it is injected into each projection.

use tokio::sync::broadcast;

use crate::command::Command;
use crate::config::Scope;
use crate::error::CoreError;
use crate::model::{Manager, ServiceRef, Technology};

/// Change notifications from the backend.
///
/// Delivery is at-least-once: a source may fire `ServicesChanged` when
/// nothing changed, so consumers must tolerate redundant events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    TechnologiesChanged,
    ServicesChanged,
    /// A scan requested for this technology finished.
    ScanFinished { technology: String },
    /// The connection manager appeared or went away.
    AvailabilityChanged { available: bool },
    /// Global state, offline mode or default technology changed.
    ManagerChanged,
}

/// Backend access used by a projection.
pub trait EntitySource: Send + Sync {
    /// Whether the connection manager is currently reachable.
    fn is_available(&self) -> bool;

    /// Manager-wide state.
    fn manager(&self) -> Manager;

    fn technologies(&self) -> Vec<Technology>;

    fn technology(&self, kind: &str) -> Option<Technology> {
        self.technologies().into_iter().find(|t| t.kind == kind)
    }

    /// Current full set of services matching `scope`, in backend order.
    fn fetch(&self, scope: &Scope) -> Result<Vec<ServiceRef>, CoreError>;

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;

    /// Queue a mutation. Returns once queued, not once applied.
    fn submit(&self, command: Command) -> Result<(), CoreError>;
}
