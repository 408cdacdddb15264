// ── Service domain types ──

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::object_path::ObjectPath;
use crate::reconcile::Identified;

/// Connection state as reported by the backend.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum ServiceState {
    #[default]
    Idle,
    Association,
    Configuration,
    Ready,
    Online,
    Disconnect,
    Failure,
}

impl ServiceState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Ready | Self::Online)
    }
}

/// Observable attributes of one network service.
///
/// A point-in-time value: the backend replaces it wholesale when any
/// attribute changes, while the service's identity (`path`) stays put.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub path: ObjectPath,
    #[serde(default)]
    pub name: String,
    /// Technology category (`wifi`, `ethernet`, `cellular`, ...).
    pub technology: String,
    #[serde(default)]
    pub state: ServiceState,
    /// In range and usable; assumed when a record leaves it out.
    #[serde(default = "default_available")]
    pub available: bool,
    /// Signal strength 0-100; `None` when the backend does not report one.
    #[serde(default)]
    pub strength: Option<u8>,
    #[serde(default)]
    pub saved: bool,
    /// Provisioned by a management policy rather than the user.
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub security: Vec<String>,
}

fn default_available() -> bool {
    true
}

impl Service {
    pub fn new(path: impl Into<ObjectPath>, name: impl Into<String>, technology: &str) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            technology: technology.to_owned(),
            state: ServiceState::Idle,
            available: true,
            strength: None,
            saved: false,
            managed: false,
            security: Vec::new(),
        }
    }

    pub fn with_strength(mut self, strength: u8) -> Self {
        self.strength = Some(strength.min(100));
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = state;
        self
    }

    pub fn with_saved(mut self, saved: bool) -> Self {
        self.saved = saved;
        self
    }

    pub fn with_managed(mut self, managed: bool) -> Self {
        self.managed = managed;
        self
    }

    pub fn connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Strength with "unknown" folded to zero.
    pub fn strength_or_zero(&self) -> u8 {
        self.strength.unwrap_or(0)
    }
}

// ── Shared handle ───────────────────────────────────────────────────

/// Backend-owned storage slot for one service.
///
/// Attributes live behind an `ArcSwap`, so an update by the backend is
/// visible to every holder of the entry without a re-fetch.
#[derive(Debug)]
struct ServiceEntry {
    path: ObjectPath,
    seq: u64,
    attrs: ArcSwap<Service>,
}

/// Cheap, cloneable handle to a backend-owned service entry.
///
/// This is what projections hold: identity plus a live view of the
/// attributes. Two handles are equal when they name the same path.
#[derive(Clone)]
pub struct ServiceRef(Arc<ServiceEntry>);

impl ServiceRef {
    pub(crate) fn new(seq: u64, service: Service) -> Self {
        Self(Arc::new(ServiceEntry {
            path: service.path.clone(),
            seq,
            attrs: ArcSwap::from_pointee(service),
        }))
    }

    pub fn path(&self) -> &ObjectPath {
        &self.0.path
    }

    /// Current attributes (cheap `Arc` clone).
    pub fn attrs(&self) -> Arc<Service> {
        self.0.attrs.load_full()
    }

    pub fn name(&self) -> String {
        self.0.attrs.load().name.clone()
    }

    pub fn technology(&self) -> String {
        self.0.attrs.load().technology.clone()
    }

    pub fn is_available(&self) -> bool {
        self.0.attrs.load().available
    }

    pub fn is_connected(&self) -> bool {
        self.0.attrs.load().connected()
    }

    pub fn is_managed(&self) -> bool {
        self.0.attrs.load().managed
    }

    /// Arrival order assigned by the backend table.
    pub(crate) fn seq(&self) -> u64 {
        self.0.seq
    }

    /// Replace the attributes in place. The path is pinned to the entry's.
    pub(crate) fn store(&self, mut service: Service) {
        service.path = self.0.path.clone();
        self.0.attrs.store(Arc::new(service));
    }

    #[cfg(test)]
    pub(crate) fn same_entry(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ServiceRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.path == other.0.path
    }
}

impl Eq for ServiceRef {}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRef")
            .field("path", &self.0.path)
            .field("attrs", &self.0.attrs.load())
            .finish()
    }
}

impl Identified for ServiceRef {
    type Key = ObjectPath;
    type View = Arc<Service>;

    fn key(&self) -> &ObjectPath {
        self.path()
    }

    fn view(&self) -> Arc<Service> {
        self.attrs()
    }
}
