// ── Core error types ──
//
// Errors surfaced by projections and the backend seam. None of them is
// fatal to a projection: a failed refresh leaves the held list as it was.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Backend errors ───────────────────────────────────────────────
    #[error("Backend is not available")]
    BackendUnavailable,

    #[error("Unknown technology: {name}")]
    UnknownTechnology { name: String },

    #[error("Fetching {scope} failed: {reason}")]
    FetchFailed { scope: String, reason: String },

    #[error("Command channel closed")]
    CommandChannelClosed,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Service not found: {path}")]
    ServiceNotFound { path: String },

    #[error("Invalid property {name}: {reason}")]
    InvalidProperty { name: String, reason: String },

    #[error("Index {index} out of range for list of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Edit {edit} is invalid for a list of {len}")]
    InvalidEdit { edit: String, len: usize },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}
