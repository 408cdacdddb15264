// ── In-memory backend ──
//
// A concurrent stand-in for the connection manager: owns service and
// technology state, broadcasts change events, queues commands.

mod registry;
mod table;

pub use registry::ServiceRegistry;
