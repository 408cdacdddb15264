//! Config subcommand handlers.

use std::fmt::Write;

use serde::Serialize;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ProjectionSummary<'a> {
    name: &'a str,
    default: bool,
    scope: String,
    order: &'static str,
}

fn summaries(cfg: &Config) -> Vec<ProjectionSummary<'_>> {
    cfg.projections
        .iter()
        .map(|(name, projection)| ProjectionSummary {
            name,
            default: cfg.default_projection.as_deref() == Some(name.as_str()),
            scope: projection.scope().to_string(),
            order: match projection.policy() {
                None => "arrival",
                Some(connlist_core::SortPolicy::Plain) => "plain",
                Some(connlist_core::SortPolicy::Grouped) => "grouped",
            },
        })
        .collect()
}

fn format_summaries(rows: &[ProjectionSummary<'_>]) -> String {
    let mut out = String::new();
    for row in rows {
        let marker = if row.default { "*" } else { " " };
        let _ = writeln!(out, "{marker} {:<12} {:<24} {}", row.name, row.scope, row.order);
    }
    out.trim_end().to_owned()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);

    match &args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            connlist_config::save_config_to(&Config::default(), &path)?;
            output::print_output(&format!("Wrote {}", path.display()), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let format = config::output_format(global, &cfg)?;
            let rendered =
                output::render_single(format, &cfg, |c| Ok(toml::to_string_pretty(c)?))?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Projections => {
            let cfg = config::load(global)?;
            let format = config::output_format(global, &cfg)?;
            let rows = summaries(&cfg);
            let rendered = output::render_single(format, &rows, |r| Ok(format_summaries(r)))?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load(global)?;
            // Resolve first so an unknown name fails with the known list.
            cfg.projection(Some(name))?;
            cfg.default_projection = Some(name.clone());
            connlist_config::save_config_to(&cfg, &path)?;
            output::print_output(&format!("Default projection set to '{name}'"), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_mark_the_default() {
        let cfg = Config::default();
        let text = format_summaries(&summaries(&cfg));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  saved"));
        assert!(lines[0].ends_with("plain"));
        assert!(lines[1].starts_with("* wifi"));
        assert!(lines[1].contains("wifi/all"));
    }
}
