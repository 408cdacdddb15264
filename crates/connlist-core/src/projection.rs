// ── Projection facade ──
//
// One ordered, observable view over a backend: a source, a configuration,
// a reconciler and the sink watching it. Backend events and configuration
// changes funnel into `refresh`, which is the only place the held list
// changes.

use std::sync::Arc;

use indexmap::IndexSet;
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::{ProjectionConfig, ServiceFilter};
use crate::error::CoreError;
use crate::model::{Manager, ManagerState, ObjectPath, ServiceRef, Technology};
use crate::reconcile::{Reconciler, StructuralEdit};
use crate::sink::{ChangeSink, NullSink};
use crate::source::{BackendEvent, EntitySource};
use crate::stream::{ProjectionSnapshot, ProjectionStream};

/// Why a refresh left the held list untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// Changes are inhibited; the refresh is applied once they are allowed.
    Inhibited,
    BackendUnavailable,
    /// The configured technology is not known to the backend.
    UnknownTechnology,
    FetchFailed,
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Reconciled { edits: Vec<StructuralEdit<ObjectPath>> },
    Skipped(SkipReason),
}

impl RefreshOutcome {
    /// Applied edits; empty when skipped.
    pub fn edits(&self) -> &[StructuralEdit<ObjectPath>] {
        match self {
            Self::Reconciled { edits } => edits,
            Self::Skipped(_) => &[],
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// An ordered projection of backend services.
///
/// Not internally synchronized: one owner (usually a
/// [`ProjectionDriver`](crate::ProjectionDriver)) applies events in turn.
pub struct Projection<S: EntitySource + ?Sized, K: ChangeSink = NullSink> {
    source: Arc<S>,
    config: ProjectionConfig,
    list: Reconciler<ServiceRef>,
    sink: K,
    inhibited: bool,
    pending: bool,
    scanning: bool,
    snapshot: watch::Sender<ProjectionSnapshot>,
}

impl<S: EntitySource + ?Sized> Projection<S, NullSink> {
    /// A projection nobody observes edit by edit.
    pub fn unobserved(source: Arc<S>, config: ProjectionConfig) -> Self {
        Self::new(source, config, NullSink)
    }
}

impl<S: EntitySource + ?Sized, K: ChangeSink> Projection<S, K> {
    /// Create an empty projection. Nothing is fetched until the first
    /// [`refresh`](Self::refresh).
    pub fn new(source: Arc<S>, config: ProjectionConfig, sink: K) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            source,
            config,
            list: Reconciler::new(),
            sink,
            inhibited: false,
            pending: false,
            scanning: false,
            snapshot,
        }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch the configured scope and reconcile the held list against it.
    ///
    /// Failures never touch the held list.
    pub fn refresh(&mut self) -> RefreshOutcome {
        if self.inhibited {
            debug!("changes inhibited, deferring refresh");
            self.pending = true;
            return RefreshOutcome::Skipped(SkipReason::Inhibited);
        }
        self.pending = false;

        let scope = self.config.scope();
        if !scope.is_all_technologies() && self.source.technology(&scope.technology).is_none() {
            warn!(technology = %scope.technology, "unknown technology, skipping refresh");
            return RefreshOutcome::Skipped(SkipReason::UnknownTechnology);
        }

        let snapshot = match self.source.fetch(&scope) {
            Ok(snapshot) => snapshot,
            Err(CoreError::BackendUnavailable) => {
                debug!(%scope, "backend unavailable, keeping held list");
                return RefreshOutcome::Skipped(SkipReason::BackendUnavailable);
            }
            Err(e) => {
                warn!(%scope, error = %e, "fetch failed, keeping held list");
                return RefreshOutcome::Skipped(SkipReason::FetchFailed);
            }
        };

        let policy = self.config.policy();
        let edits = self
            .list
            .reconcile(snapshot, policy.as_ref(), &mut self.sink);
        self.publish();
        RefreshOutcome::Reconciled { edits }
    }

    /// React to one backend event. Returns the outcome when the event
    /// touched the held list.
    pub fn handle_event(&mut self, event: &BackendEvent) -> Option<RefreshOutcome> {
        match event {
            BackendEvent::TechnologiesChanged | BackendEvent::ServicesChanged => {
                Some(self.refresh())
            }
            BackendEvent::ScanFinished { technology } => {
                if *technology == self.config.technology {
                    self.scanning = false;
                }
                None
            }
            BackendEvent::AvailabilityChanged { available: false } => {
                info!("connection manager went away, clearing projection");
                self.scanning = false;
                let edits = self.list.clear(&mut self.sink);
                self.publish();
                Some(RefreshOutcome::Reconciled { edits })
            }
            BackendEvent::AvailabilityChanged { available: true } => {
                info!("connection manager is back");
                Some(self.refresh())
            }
            // Read on demand through `manager()`; the list is unaffected.
            BackendEvent::ManagerChanged => None,
        }
    }

    /// Hold back refreshes while `inhibited`. Lifting the inhibition
    /// applies one refresh if any was requested meanwhile.
    pub fn set_changes_inhibited(&mut self, inhibited: bool) -> Option<RefreshOutcome> {
        if self.inhibited == inhibited {
            return None;
        }
        self.inhibited = inhibited;
        if !inhibited && self.pending {
            return Some(self.refresh());
        }
        None
    }

    pub fn changes_inhibited(&self) -> bool {
        self.inhibited
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Replace the whole configuration, rebuilding if anything changed.
    pub fn set_config(&mut self, config: ProjectionConfig) -> Option<RefreshOutcome> {
        if self.config == config {
            return None;
        }
        debug!(?config, "projection reconfigured");
        if config.technology != self.config.technology {
            self.scanning = false;
        }
        self.config = config;
        Some(self.refresh())
    }

    pub fn set_technology(&mut self, technology: &str) -> Option<RefreshOutcome> {
        let config = self.config.clone();
        self.set_config(ProjectionConfig {
            technology: technology.to_owned(),
            ..config
        })
    }

    pub fn set_filter(&mut self, filter: ServiceFilter) -> Option<RefreshOutcome> {
        let config = self.config.clone().with_filter(filter);
        self.set_config(config)
    }

    pub fn set_sort(&mut self, sort: bool) -> Option<RefreshOutcome> {
        let config = self.config.clone().with_sort(sort);
        self.set_config(config)
    }

    pub fn set_group_by_category(&mut self, group: bool) -> Option<RefreshOutcome> {
        let config = self.config.clone().with_group_by_category(group);
        self.set_config(config)
    }

    // ── Held list ────────────────────────────────────────────────────

    pub fn count(&self) -> usize {
        self.list.len()
    }

    pub fn get(&self, index: usize) -> Option<ServiceRef> {
        self.list.get(index).cloned()
    }

    pub fn index_of(&self, path: &ObjectPath) -> Option<usize> {
        self.list.position(path)
    }

    pub fn services(&self) -> &[ServiceRef] {
        self.list.items()
    }

    pub fn any_available(&self) -> bool {
        self.list.items().iter().any(ServiceRef::is_available)
    }

    pub fn any_connected(&self) -> bool {
        self.list.items().iter().any(ServiceRef::is_connected)
    }

    /// Technology categories present, in order of first appearance.
    pub fn categories(&self) -> IndexSet<String> {
        self.list.items().iter().map(ServiceRef::technology).collect()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Subscribe to whole-list snapshots published after each change.
    pub fn subscribe(&self) -> ProjectionStream {
        ProjectionStream::new(self.snapshot.subscribe())
    }

    fn publish(&self) {
        let snap: Vec<_> = self.list.items().iter().map(ServiceRef::attrs).collect();
        self.snapshot.send_replace(Arc::new(snap));
    }

    // ── Technology state ─────────────────────────────────────────────

    pub fn technology(&self) -> Option<Technology> {
        if self.config.technology.is_empty() || !self.source.is_available() {
            return None;
        }
        self.source.technology(&self.config.technology)
    }

    /// Whether the configured technology is known to a live backend.
    pub fn is_available(&self) -> bool {
        self.technology().is_some()
    }

    pub fn is_powered(&self) -> bool {
        self.technology().is_some_and(|t| t.powered)
    }

    pub fn is_connected(&self) -> bool {
        self.technology().is_some_and(|t| t.connected)
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    // ── Manager state ────────────────────────────────────────────────

    /// Manager-wide state, `None` while the backend is unreachable.
    pub fn manager(&self) -> Option<Manager> {
        self.source
            .is_available()
            .then(|| self.source.manager())
    }

    pub fn state(&self) -> ManagerState {
        self.manager().map_or(ManagerState::Offline, |m| m.state)
    }

    pub fn offline_mode(&self) -> bool {
        self.manager().is_some_and(|m| m.offline_mode)
    }

    pub fn default_technology(&self) -> Option<String> {
        self.manager().and_then(|m| m.default_technology)
    }

    /// Every technology the backend knows, by kind.
    pub fn available_technologies(&self) -> Vec<String> {
        self.technology_kinds(|_| true)
    }

    pub fn enabled_technologies(&self) -> Vec<String> {
        self.technology_kinds(|t| t.powered)
    }

    pub fn connected_technologies(&self) -> Vec<String> {
        self.technology_kinds(|t| t.connected)
    }

    fn technology_kinds(&self, keep: impl Fn(&Technology) -> bool) -> Vec<String> {
        if !self.source.is_available() {
            return Vec::new();
        }
        self.source
            .technologies()
            .into_iter()
            .filter(keep)
            .map(|t| t.kind)
            .collect()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn connect_service(
        &self,
        index: usize,
        passphrase: Option<SecretString>,
    ) -> Result<(), CoreError> {
        let path = self.path_at(index)?;
        self.source
            .submit(Command::ConnectService { path, passphrase })
    }

    pub fn disconnect_service(&self, index: usize) -> Result<(), CoreError> {
        let path = self.path_at(index)?;
        self.source.submit(Command::DisconnectService { path })
    }

    pub fn set_service_property(
        &self,
        index: usize,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), CoreError> {
        let path = self.path_at(index)?;
        self.source.submit(Command::SetServiceProperty {
            path,
            name: name.to_owned(),
            value,
        })
    }

    /// Enable or disable the configured technology.
    pub fn set_powered(&self, powered: bool) -> Result<(), CoreError> {
        let technology = self.require_technology()?;
        self.source.submit(Command::SetPowered {
            technology: technology.kind,
            powered,
        })
    }

    pub fn request_scan(&mut self) -> Result<(), CoreError> {
        let technology = self.require_technology()?;
        self.source.submit(Command::RequestScan {
            technology: technology.kind,
        })?;
        self.scanning = true;
        Ok(())
    }

    /// Power on any known technology, not just the configured one.
    pub fn enable_technology(&self, kind: &str) -> Result<(), CoreError> {
        self.power_technology(kind, true)
    }

    pub fn disable_technology(&self, kind: &str) -> Result<(), CoreError> {
        self.power_technology(kind, false)
    }

    pub fn set_offline_mode(&self, enabled: bool) -> Result<(), CoreError> {
        if !self.source.is_available() {
            return Err(CoreError::BackendUnavailable);
        }
        self.source.submit(Command::SetOfflineMode { enabled })
    }

    fn power_technology(&self, kind: &str, powered: bool) -> Result<(), CoreError> {
        if !self.source.is_available() {
            return Err(CoreError::BackendUnavailable);
        }
        let technology = self
            .source
            .technology(kind)
            .ok_or_else(|| CoreError::UnknownTechnology {
                name: kind.to_owned(),
            })?;
        self.source.submit(Command::SetPowered {
            technology: technology.kind,
            powered,
        })
    }

    fn path_at(&self, index: usize) -> Result<ObjectPath, CoreError> {
        self.list
            .get(index)
            .map(|s| s.path().clone())
            .ok_or(CoreError::IndexOutOfRange {
                index,
                len: self.list.len(),
            })
    }

    fn require_technology(&self) -> Result<Technology, CoreError> {
        self.technology().ok_or_else(|| CoreError::UnknownTechnology {
            name: self.config.technology.clone(),
        })
    }
}
