//! Ordered, minimally-diffed projections of a connection manager's
//! service list.
//!
//! The backend hands out services in whatever order they arrive. This
//! crate keeps a locally held, sorted copy per consumer and tells an
//! observer exactly which rows were inserted, moved, removed or touched
//! after each refresh:
//!
//! - **[`Reconciler`]** — Generic single-pass engine. Given the held
//!   sequence and a fresh snapshot (matched by identity, not position) it
//!   applies and returns a [`StructuralEdit`] script, announcing each edit
//!   to a [`ChangeSink`] as a begin/end region.
//!
//! - **Ordering** ([`ordering`]) — Pure comparators: [`PlainOrder`]
//!   (available, then strength, then name) and [`GroupedOrder`] (managed
//!   first), selected per projection through [`SortPolicy`].
//!
//! - **[`Projection`]** — Facade wiring an [`EntitySource`], a
//!   [`ProjectionConfig`], the engine and a sink. Handles backend events,
//!   change inhibition, daemon loss and scan state, reports manager-wide
//!   state ([`Manager`]) and forwards [`Command`]s to the backend.
//!
//! - **[`ServiceRegistry`]** — In-memory backend (`DashMap` + `ArcSwap`)
//!   implementing [`EntitySource`]. Service handles stay live across
//!   attribute updates.
//!
//! - **[`ProjectionDriver`]** — tokio task applying broadcast backend
//!   events to a projection until its `CancellationToken` fires.

pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod model;
pub mod ordering;
pub mod projection;
pub mod reconcile;
pub mod sink;
pub mod source;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::Command;
pub use config::{ProjectionConfig, Scope, ServiceFilter};
pub use driver::ProjectionDriver;
pub use error::CoreError;
pub use model::{Manager, ManagerState, ObjectPath, Service, ServiceRef, ServiceState, Technology};
pub use ordering::{GroupedOrder, OrderingPolicy, PlainOrder, SortPolicy};
pub use projection::{Projection, RefreshOutcome, SkipReason};
pub use reconcile::{Identified, Reconciler, StructuralEdit, replay};
pub use sink::{ChangeSink, NullSink, RecordingSink, SinkEvent};
pub use source::{BackendEvent, EntitySource};
pub use store::ServiceRegistry;
pub use stream::{ProjectionSnapshot, ProjectionStream};
