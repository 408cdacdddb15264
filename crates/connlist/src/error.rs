//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use connlist_config::ConfigError;
use connlist_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const INVALID_INPUT: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const INCONSISTENT: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Input files ──────────────────────────────────────────────────
    #[error("Could not read {path}")]
    #[diagnostic(code(connlist::read_failed), help("Check that the file exists and is readable."))]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid snapshot file {path}: {reason}")]
    #[diagnostic(
        code(connlist::invalid_snapshot),
        help(
            "Expected a document with `technologies` and a list of `frames`.\n\
             Each frame may set `services`, `available`, `inhibit` or `fetch_error`."
        )
    )]
    InvalidSnapshot { path: String, reason: String },

    // ── Replay ───────────────────────────────────────────────────────
    #[error("Edit script for frame {frame} does not reproduce the projection")]
    #[diagnostic(code(connlist::diverged), help("{detail}"))]
    Diverged { frame: usize, detail: String },

    #[error("Change notifications for frame {frame} broke the begin/end protocol")]
    #[diagnostic(code(connlist::protocol), help("{detail}"))]
    Protocol { frame: usize, detail: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(connlist::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Projection '{name}' not found in configuration")]
    #[diagnostic(
        code(connlist::projection_not_found),
        help(
            "Available projections: {available}\n\
             List them with: connlist config projections"
        )
    )]
    ProjectionNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(connlist::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(connlist::config))]
    Config(Box<ConfigError>),

    // ── Core ─────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(connlist::core))]
    Core(#[from] CoreError),

    // ── Serialization ────────────────────────────────────────────────
    #[error("Could not render output: {0}")]
    #[diagnostic(code(connlist::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => exit_code::USAGE,
            Self::ReadFailed { .. } | Self::ProjectionNotFound { .. } => exit_code::NOT_FOUND,
            Self::InvalidSnapshot { .. } | Self::Config(_) => exit_code::INVALID_INPUT,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Diverged { .. } | Self::Protocol { .. } => exit_code::INCONSISTENT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProjection { name, known } => Self::ProjectionNotFound {
                name,
                available: known,
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_specific_variants() {
        let err = CliError::from(ConfigError::UnknownProjection {
            name: "x".into(),
            known: "wifi".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);

        let err = CliError::from(ConfigError::NoDefaultProjection);
        assert_eq!(err.exit_code(), exit_code::INVALID_INPUT);
    }

    #[test]
    fn core_errors_are_general() {
        let err = CliError::from(CoreError::BackendUnavailable);
        assert_eq!(err.exit_code(), exit_code::GENERAL);
        assert_eq!(err.to_string(), "Backend is not available");
    }
}
