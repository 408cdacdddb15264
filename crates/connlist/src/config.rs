//! CLI-side configuration: resolves the config file from `GlobalOpts`
//! and merges command-line flags over the file's defaults.

use std::path::PathBuf;

use clap::ValueEnum;

pub use connlist_config::Config;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// `--config` if given, otherwise the platform config path.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(connlist_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    tracing::debug!(path = %path.display(), "loading config");
    Ok(connlist_config::load_config_from(&path)?)
}

pub fn output_format(global: &GlobalOpts, cfg: &Config) -> Result<OutputFormat, CliError> {
    match global.output {
        Some(format) => Ok(format),
        None => parse_value("defaults.output", &cfg.defaults.output),
    }
}

pub fn color_mode(global: &GlobalOpts, cfg: &Config) -> Result<ColorMode, CliError> {
    match global.color {
        Some(mode) => Ok(mode),
        None => parse_value("defaults.color", &cfg.defaults.color),
    }
}

fn parse_value<E: ValueEnum>(field: &str, raw: &str) -> Result<E, CliError> {
    E::from_str(raw, true).map_err(|reason| CliError::Validation {
        field: field.into(),
        reason,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn global() -> GlobalOpts {
        GlobalOpts {
            config: None,
            output: None,
            color: None,
            verbose: 0,
            quiet: false,
        }
    }

    #[test]
    fn flags_override_file_defaults() {
        let mut cfg = Config::default();
        cfg.defaults.output = "yaml".into();

        assert_eq!(output_format(&global(), &cfg).unwrap(), OutputFormat::Yaml);

        let mut opts = global();
        opts.output = Some(OutputFormat::Plain);
        assert_eq!(output_format(&opts, &cfg).unwrap(), OutputFormat::Plain);
    }

    #[test]
    fn file_values_parse_like_flags() {
        let mut cfg = Config::default();
        cfg.defaults.output = "json-compact".into();
        cfg.defaults.color = "NEVER".into();
        assert_eq!(
            output_format(&global(), &cfg).unwrap(),
            OutputFormat::JsonCompact
        );
        assert_eq!(color_mode(&global(), &cfg).unwrap(), ColorMode::Never);

        cfg.defaults.output = "xml".into();
        assert!(matches!(
            output_format(&global(), &cfg),
            Err(CliError::Validation { .. })
        ));
    }
}
