// ── Service registry ──
//
// In-memory connection manager. Services and technologies are stored in
// concurrent maps; every mutation is announced on a broadcast channel
// and commands land in an unbounded queue for whoever drives the backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, trace};

use super::table::ServiceTable;
use crate::command::Command;
use crate::config::Scope;
use crate::error::CoreError;
use crate::model::{Manager, ManagerState, ObjectPath, Service, ServiceRef, ServiceState, Technology};
use crate::source::{BackendEvent, EntitySource};

const EVENT_CAPACITY: usize = 256;

/// Thread-safe in-memory backend implementing [`EntitySource`].
///
/// Handles returned by [`fetch`](EntitySource::fetch) stay live: a later
/// [`upsert_service`](Self::upsert_service) or
/// [`update_service`](Self::update_service) of the same path is visible
/// through them without another fetch.
pub struct ServiceRegistry {
    services: ServiceTable,
    technologies: DashMap<String, Technology>,
    available: AtomicBool,
    state: Mutex<ManagerState>,
    offline_mode: AtomicBool,
    fetch_error: Mutex<Option<String>>,
    events: broadcast::Sender<BackendEvent>,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (last_refresh, _) = watch::channel(None);

        Self {
            services: ServiceTable::new(),
            technologies: DashMap::new(),
            available: AtomicBool::new(true),
            state: Mutex::new(ManagerState::default()),
            offline_mode: AtomicBool::new(false),
            fetch_error: Mutex::new(None),
            events,
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            last_refresh,
        }
    }

    // ── Services ─────────────────────────────────────────────────────

    /// Replace the full service set: upsert everything in `services`,
    /// then drop every path the snapshot no longer mentions.
    ///
    /// Fires a single `ServicesChanged`.
    pub fn apply_snapshot(&self, services: Vec<Service>) {
        let mut incoming = HashSet::with_capacity(services.len());
        let mut added = 0usize;

        for service in services {
            incoming.insert(service.path.clone());
            if self.services.upsert(service).1 {
                added += 1;
            }
        }

        let stale: Vec<ObjectPath> = self
            .services
            .paths()
            .into_iter()
            .filter(|path| !incoming.contains(path))
            .collect();
        for path in &stale {
            self.services.remove(path);
        }

        debug!(
            added,
            removed = stale.len(),
            total = self.services.len(),
            "service snapshot applied"
        );
        self.last_refresh.send_replace(Some(Utc::now()));
        self.notify(BackendEvent::ServicesChanged);
    }

    pub fn upsert_service(&self, service: Service) -> ServiceRef {
        let (handle, created) = self.services.upsert(service);
        trace!(path = %handle.path(), created, "service upserted");
        self.notify(BackendEvent::ServicesChanged);
        handle
    }

    /// Edit one service's attributes in place. Returns `false` if unknown.
    pub fn update_service(&self, path: &ObjectPath, f: impl FnOnce(&mut Service)) -> bool {
        let updated = self.services.update(path, f);
        if updated {
            self.notify(BackendEvent::ServicesChanged);
        }
        updated
    }

    pub fn remove_service(&self, path: &ObjectPath) -> Option<ServiceRef> {
        let removed = self.services.remove(path);
        if removed.is_some() {
            self.notify(BackendEvent::ServicesChanged);
        }
        removed
    }

    pub fn service(&self, path: &ObjectPath) -> Option<ServiceRef> {
        self.services.get(path)
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    // ── Technologies ─────────────────────────────────────────────────

    pub fn set_technologies(&self, technologies: Vec<Technology>) {
        self.technologies.clear();
        for tech in technologies {
            self.technologies.insert(tech.kind.clone(), tech);
        }
        self.notify(BackendEvent::TechnologiesChanged);
    }

    pub fn upsert_technology(&self, technology: Technology) {
        self.technologies.insert(technology.kind.clone(), technology);
        self.notify(BackendEvent::TechnologiesChanged);
    }

    pub fn update_technology(&self, kind: &str, f: impl FnOnce(&mut Technology)) -> bool {
        let updated = match self.technologies.get_mut(kind) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        };
        if updated {
            self.notify(BackendEvent::TechnologiesChanged);
        }
        updated
    }

    /// Announce the end of a scan on `technology`.
    pub fn finish_scan(&self, technology: &str) {
        self.notify(BackendEvent::ScanFinished {
            technology: technology.to_owned(),
        });
    }

    // ── Backend state ────────────────────────────────────────────────

    /// Mark the connection manager as present or gone. Fires only on change.
    pub fn set_available(&self, available: bool) {
        if self.available.swap(available, Ordering::AcqRel) != available {
            debug!(available, "backend availability changed");
            self.notify(BackendEvent::AvailabilityChanged { available });
        }
    }

    /// Set the global connectivity state. Fires only on change.
    pub fn set_state(&self, state: ManagerState) {
        let previous = std::mem::replace(
            &mut *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            state,
        );
        if previous != state {
            debug!(%state, "manager state changed");
            self.notify(BackendEvent::ManagerChanged);
        }
    }

    /// Fires only on change.
    pub fn set_offline_mode(&self, enabled: bool) {
        if self.offline_mode.swap(enabled, Ordering::AcqRel) != enabled {
            debug!(enabled, "offline mode changed");
            self.notify(BackendEvent::ManagerChanged);
        }
    }

    /// Make every subsequent fetch fail with `reason` until cleared.
    pub fn set_fetch_error(&self, reason: Option<String>) {
        *self
            .fetch_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason;
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Take the receiving end of the command queue. Only the first call
    /// gets it.
    pub fn take_command_receiver(&self) -> Option<mpsc::UnboundedReceiver<Command>> {
        self.command_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Apply a command's effect to the stored state, the way a live
    /// connection manager eventually would.
    pub fn execute(&self, command: &Command) -> Result<(), CoreError> {
        debug!(command = command.label(), "executing command");
        match command {
            Command::ConnectService { path, .. } => {
                self.require_service(path)?;
                self.update_service(path, |s| s.state = ServiceState::Online);
            }
            Command::DisconnectService { path } => {
                self.require_service(path)?;
                self.update_service(path, |s| s.state = ServiceState::Idle);
            }
            Command::SetServiceProperty { path, name, value } => {
                let handle = self.require_service(path)?;
                let mut next = (*handle.attrs()).clone();
                apply_property(&mut next, name, value)?;
                self.upsert_service(next);
            }
            Command::SetPowered {
                technology,
                powered,
            } => {
                if !self.update_technology(technology, |t| t.powered = *powered) {
                    return Err(CoreError::UnknownTechnology {
                        name: technology.clone(),
                    });
                }
            }
            Command::RequestScan { technology } => self.finish_scan(technology),
            Command::SetOfflineMode { enabled } => self.set_offline_mode(*enabled),
        }
        Ok(())
    }

    fn require_service(&self, path: &ObjectPath) -> Result<ServiceRef, CoreError> {
        self.services
            .get(path)
            .ok_or_else(|| CoreError::ServiceNotFound {
                path: path.to_string(),
            })
    }

    fn notify(&self, event: BackendEvent) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(event);
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Writable service properties.
fn apply_property(
    service: &mut Service,
    name: &str,
    value: &serde_json::Value,
) -> Result<(), CoreError> {
    let invalid = |reason: &str| CoreError::InvalidProperty {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };
    match name {
        "Name" => {
            let v = value.as_str().ok_or_else(|| invalid("expected a string"))?;
            service.name = v.to_owned();
        }
        "AutoConnect" | "Favorite" => {
            service.saved = value.as_bool().ok_or_else(|| invalid("expected a boolean"))?;
        }
        _ => return Err(invalid("not writable")),
    }
    trace!(name, path = %service.path, "service property set");
    Ok(())
}

impl EntitySource for ServiceRegistry {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// The default technology is that of the first connected service in
    /// backend order.
    fn manager(&self) -> Manager {
        let default_technology = self
            .services
            .ordered()
            .into_iter()
            .find(ServiceRef::is_connected)
            .as_ref()
            .map(ServiceRef::technology);
        Manager {
            state: *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            offline_mode: self.offline_mode.load(Ordering::Acquire),
            default_technology,
        }
    }

    fn technologies(&self) -> Vec<Technology> {
        let mut all: Vec<Technology> = self.technologies.iter().map(|t| t.value().clone()).collect();
        all.sort_by(|a, b| a.kind.cmp(&b.kind));
        all
    }

    fn technology(&self, kind: &str) -> Option<Technology> {
        self.technologies.get(kind).map(|t| t.value().clone())
    }

    fn fetch(&self, scope: &Scope) -> Result<Vec<ServiceRef>, CoreError> {
        if !self.is_available() {
            return Err(CoreError::BackendUnavailable);
        }
        if let Some(reason) = self
            .fetch_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(CoreError::FetchFailed {
                scope: scope.to_string(),
                reason,
            });
        }

        Ok(self
            .services
            .ordered()
            .into_iter()
            .filter(|s| scope.matches(&s.attrs()))
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }

    fn submit(&self, command: Command) -> Result<(), CoreError> {
        debug!(command = command.label(), "command queued");
        self.command_tx
            .send(command)
            .map_err(|_| CoreError::CommandChannelClosed)
    }
}
