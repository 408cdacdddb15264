// ── Domain model ──
//
// Canonical types for backend entities. Projections only ever read
// these; the backend table owns and mutates them.

pub mod manager;
pub mod object_path;
pub mod service;
pub mod technology;

pub use manager::{Manager, ManagerState};
pub use object_path::ObjectPath;
pub use service::{Service, ServiceRef, ServiceState};
pub use technology::Technology;
