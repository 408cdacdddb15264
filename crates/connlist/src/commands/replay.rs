//! `connlist replay`: drive a projection from a recorded snapshot file.
//!
//! Each frame mutates an in-memory backend, then the backend's events
//! are applied to the projection. Every emitted edit script is replayed
//! against a shadow list of paths and must reproduce the projection.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabled::Tabled;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info};

use connlist_core::{
    BackendEvent, EntitySource, Manager, ManagerState, ObjectPath, Projection, ProjectionConfig,
    RecordingSink, RefreshOutcome, Service, ServiceRef, ServiceRegistry, SinkEvent, SkipReason,
    StructuralEdit, Technology, replay,
};

use crate::cli::{GlobalOpts, OutputFormat, ReplayArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Snapshot file ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotFile {
    #[serde(default)]
    pub technologies: Vec<TechnologySpec>,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TechnologySpec {
    pub kind: String,
    #[serde(default)]
    pub powered: bool,
    #[serde(default)]
    pub connected: bool,
}

impl TechnologySpec {
    fn into_technology(self) -> Technology {
        Technology::new(&self.kind)
            .with_powered(self.powered)
            .with_connected(self.connected)
    }
}

/// One step of backend activity.
///
/// Backend changes (`fetch_error`, `technologies`, `services`, `state`,
/// `offline_mode`, `available`) are applied first, then the resulting events are handled,
/// then `inhibit` takes effect. `fetch_error` lasts for this frame only.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Frame {
    pub label: Option<String>,
    pub technologies: Option<Vec<TechnologySpec>>,
    /// Full service set; replaces whatever the backend held.
    pub services: Option<Vec<Service>>,
    pub state: Option<ManagerState>,
    pub offline_mode: Option<bool>,
    pub available: Option<bool>,
    pub inhibit: Option<bool>,
    pub fetch_error: Option<String>,
}

pub fn read_snapshot_file(path: &Path) -> Result<SnapshotFile, CliError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::ReadFailed {
        path: display.clone(),
        source,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let parsed = if is_yaml {
        serde_yaml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| CliError::InvalidSnapshot {
        path: display,
        reason,
    })
}

// ── Report ───────────────────────────────────────────────────────────

/// What one frame did to the projection.
#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub frame: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub edits: Vec<StructuralEdit<ObjectPath>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkipReason>,
    pub notifications: Vec<SinkEvent>,
    /// Service names in projection order after the frame.
    pub services: Vec<String>,
    /// Manager-wide state after the frame; absent while the backend is gone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<Manager>,
    pub enabled_technologies: Vec<String>,
}

impl FrameReport {
    fn title(&self) -> String {
        match &self.label {
            Some(label) => format!("{} {label}", self.frame),
            None => self.frame.to_string(),
        }
    }
}

#[derive(Tabled)]
struct EditRow {
    #[tabled(rename = "Frame")]
    frame: String,
    #[tabled(rename = "Op")]
    op: String,
    #[tabled(rename = "Edit")]
    edit: String,
    #[tabled(rename = "Count")]
    count: usize,
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Tech")]
    technology: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Avail")]
    available: String,
    #[tabled(rename = "Strength")]
    strength: String,
    #[tabled(rename = "Managed")]
    managed: String,
}

fn op_name<K>(edit: &StructuralEdit<K>) -> &'static str {
    match edit {
        StructuralEdit::Insert { .. } => "insert",
        StructuralEdit::Move { .. } => "move",
        StructuralEdit::Remove { .. } => "remove",
        StructuralEdit::Touch { .. } => "touch",
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes".into() } else { "-".into() }
}

fn edit_rows(report: &FrameReport, color: bool) -> Vec<EditRow> {
    let count = report.services.len();
    let edits = report.edits.iter().map(|edit| EditRow {
        frame: report.title(),
        op: output::paint_op(op_name(edit), color),
        edit: edit.to_string(),
        count,
    });
    let skips = report.skipped.iter().map(|reason| EditRow {
        frame: report.title(),
        op: output::paint_op("skip", color),
        edit: reason.to_string(),
        count,
    });
    edits.chain(skips).collect()
}

fn edit_lines(report: &FrameReport) -> Vec<String> {
    let edits = report
        .edits
        .iter()
        .map(|edit| format!("{}\t{edit}", report.frame));
    let skips = report
        .skipped
        .iter()
        .map(|reason| format!("{}\tskip {reason}", report.frame));
    edits.chain(skips).collect()
}

fn service_row(index: usize, service: &Service) -> ServiceRow {
    ServiceRow {
        index,
        name: service.name.clone(),
        technology: service.technology.clone(),
        state: service.state.to_string(),
        available: yes_no(service.available),
        strength: service
            .strength
            .map_or_else(|| "-".into(), |s| s.to_string()),
        managed: yes_no(service.managed),
    }
}

// ── Replay ───────────────────────────────────────────────────────────

/// Runs frames through one projection and checks every edit script.
pub struct Replayer {
    registry: Arc<ServiceRegistry>,
    events: broadcast::Receiver<BackendEvent>,
    projection: Projection<ServiceRegistry, RecordingSink>,
    shadow: Vec<ObjectPath>,
}

impl Replayer {
    pub fn new(technologies: Vec<TechnologySpec>, config: ProjectionConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::new());
        registry.set_technologies(
            technologies
                .into_iter()
                .map(TechnologySpec::into_technology)
                .collect(),
        );
        let events = registry.subscribe();
        let projection = Projection::new(Arc::clone(&registry), config, RecordingSink::new());

        Self {
            registry,
            events,
            projection,
            shadow: Vec::new(),
        }
    }

    pub fn projection(&self) -> &Projection<ServiceRegistry, RecordingSink> {
        &self.projection
    }

    pub fn apply(&mut self, index: usize, frame: Frame) -> Result<FrameReport, CliError> {
        debug!(frame = index, label = ?frame.label, "applying frame");

        if let Some(reason) = &frame.fetch_error {
            self.registry.set_fetch_error(Some(reason.clone()));
        }
        if let Some(technologies) = frame.technologies {
            self.registry.set_technologies(
                technologies
                    .into_iter()
                    .map(TechnologySpec::into_technology)
                    .collect(),
            );
        }
        if let Some(services) = frame.services {
            self.registry.apply_snapshot(services);
        }
        if let Some(state) = frame.state {
            self.registry.set_state(state);
        }
        if let Some(enabled) = frame.offline_mode {
            self.registry.set_offline_mode(enabled);
        }
        if let Some(available) = frame.available {
            self.registry.set_available(available);
        }

        let mut outcomes = self.drain_events();
        if let Some(inhibit) = frame.inhibit {
            outcomes.extend(self.projection.set_changes_inhibited(inhibit));
        }
        self.registry.set_fetch_error(None);

        let mut edits = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                RefreshOutcome::Reconciled { edits: applied } => edits.extend(applied),
                RefreshOutcome::Skipped(reason) => skipped.push(reason),
            }
        }

        self.verify(index, &edits)?;

        Ok(FrameReport {
            frame: index,
            label: frame.label,
            edits,
            skipped,
            notifications: self.projection.sink_mut().take_events(),
            services: self
                .projection
                .services()
                .iter()
                .map(ServiceRef::name)
                .collect(),
            manager: self.projection.manager(),
            enabled_technologies: self.projection.enabled_technologies(),
        })
    }

    /// Handle queued backend events. The backend is already in its final
    /// state for the frame, so one refresh covers a run of change events.
    fn drain_events(&mut self) -> Vec<RefreshOutcome> {
        let mut outcomes = Vec::new();
        let mut refreshed = false;

        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "event queue lagged");
                    BackendEvent::ServicesChanged
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            };

            match event {
                BackendEvent::TechnologiesChanged
                | BackendEvent::ServicesChanged
                | BackendEvent::AvailabilityChanged { available: true } => {
                    if refreshed {
                        continue;
                    }
                    refreshed = true;
                }
                BackendEvent::AvailabilityChanged { available: false } => refreshed = false,
                BackendEvent::ScanFinished { .. } | BackendEvent::ManagerChanged => {}
            }
            outcomes.extend(self.projection.handle_event(&event));
        }
        outcomes
    }

    fn verify(&mut self, frame: usize, edits: &[StructuralEdit<ObjectPath>]) -> Result<(), CliError> {
        if let Some(violation) = self.projection.sink().violations().first() {
            return Err(CliError::Protocol {
                frame,
                detail: violation.clone(),
            });
        }

        replay(edits, &mut self.shadow).map_err(|e| CliError::Diverged {
            frame,
            detail: e.to_string(),
        })?;

        let held: Vec<&ObjectPath> = self
            .projection
            .services()
            .iter()
            .map(ServiceRef::path)
            .collect();
        if !self.shadow.iter().eq(held.iter().copied()) {
            return Err(CliError::Diverged {
                frame,
                detail: format!("replayed {:?}, projection holds {held:?}", self.shadow),
            });
        }
        Ok(())
    }
}

// ── Handler ──────────────────────────────────────────────────────────

/// Pick the projection: a named (or default) profile, with explicit
/// flags layered on top. Flags alone start from every technology, unsorted.
pub fn resolve_projection(args: &ReplayArgs, cfg: &Config) -> Result<ProjectionConfig, CliError> {
    let explicit = args.technology.is_some() || args.filter.is_some() || args.sort || args.group;

    let mut projection = if args.profile.is_none() && explicit {
        ProjectionConfig::technology("")
    } else {
        cfg.projection(args.profile.as_deref())?
    };

    if let Some(technology) = &args.technology {
        projection.technology = if technology == "all" {
            String::new()
        } else {
            technology.clone()
        };
    }
    if let Some(filter) = args.filter {
        projection.filter = filter;
    }
    if args.sort || args.group {
        projection.sort = true;
    }
    if args.group {
        projection.group_by_category = true;
    }
    Ok(projection)
}

pub fn handle(args: &ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let format = config::output_format(global, &cfg)?;
    let color = output::should_color(config::color_mode(global, &cfg)?);
    let projection = resolve_projection(args, &cfg)?;
    let file = read_snapshot_file(&args.file)?;

    info!(
        file = %args.file.display(),
        frames = file.frames.len(),
        scope = %projection.scope(),
        "replaying"
    );

    let mut replayer = Replayer::new(file.technologies, projection);
    let mut reports = Vec::with_capacity(file.frames.len());
    for (index, frame) in file.frames.into_iter().enumerate() {
        reports.push(replayer.apply(index, frame)?);
    }

    let rendered = if args.final_only {
        let services: Vec<Arc<Service>> = replayer
            .projection()
            .services()
            .iter()
            .map(ServiceRef::attrs)
            .collect();
        let rows: Vec<ServiceRow> = services
            .iter()
            .enumerate()
            .map(|(i, s)| service_row(i, s))
            .collect();
        match format {
            OutputFormat::Table => output::render_table(&rows),
            OutputFormat::Plain => services
                .iter()
                .map(|s| s.path.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => output::render_single(format, &services, |_| Ok(String::new()))?,
        }
    } else {
        output::render_list(
            format,
            &reports,
            |report| edit_rows(report, color),
            edit_lines,
        )?
    };

    output::print_output(&rendered, global.quiet);
    Ok(())
}
