//! Configuration for connlist tools.
//!
//! A TOML file of named projections plus output defaults, layered under
//! `CONNLIST_` environment variables. Core never reads files; this crate
//! turns a profile name into a [`ProjectionConfig`] it can hand over.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use connlist_core::ProjectionConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no projection named '{name}' (known: {known})")]
    UnknownProjection { name: String, known: String },

    #[error("no projection selected and no default_projection configured")]
    NoDefaultProjection,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Projection used when none is named on the command line.
    pub default_projection: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named projections, `[projections.<name>]` in TOML.
    #[serde(default)]
    pub projections: BTreeMap<String, ProjectionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut projections = BTreeMap::new();
        projections.insert("wifi".into(), ProjectionConfig::technology("wifi").with_sort(true));
        projections.insert("saved".into(), ProjectionConfig::saved(""));

        Self {
            default_projection: Some("wifi".into()),
            defaults: Defaults::default(),
            projections,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

impl Config {
    /// Resolve a projection by name, falling back to `default_projection`.
    pub fn projection(&self, name: Option<&str>) -> Result<ProjectionConfig, ConfigError> {
        let name = name
            .or(self.default_projection.as_deref())
            .ok_or(ConfigError::NoDefaultProjection)?;

        self.projections
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProjection {
                name: name.into(),
                known: self.projection_names().join(", "),
            })
    }

    pub fn projection_names(&self) -> Vec<&str> {
        self.projections.keys().map(String::as_str).collect()
    }

    /// Reject configurations that load fine but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, projection) in &self.projections {
            if projection.group_by_category && !projection.sort {
                return Err(ConfigError::Validation {
                    field: format!("projections.{name}.group_by_category"),
                    reason: "grouping only applies to sorted projections".into(),
                });
            }
            if !projection
                .technology
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(ConfigError::Validation {
                    field: format!("projections.{name}.technology"),
                    reason: format!("'{}' is not a technology name", projection.technology),
                });
            }
        }
        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "connlist", "connlist").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("connlist");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then `path`, then `CONNLIST_*` variables.
///
/// Nested keys use a double underscore: `CONNLIST_DEFAULTS__OUTPUT=json`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CONNLIST_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
