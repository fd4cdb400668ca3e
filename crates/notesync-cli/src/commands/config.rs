//! Config command - View and check the notesync configuration
//!
//! Provides the `notesync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use notesync_conflict::PolicyEngine;
use notesync_core::config::Config;

use crate::context::AppContext;
use crate::output::plural;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&ctx.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        // Re-read explicitly: the context falls back to defaults silently
        let config = match Config::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {e}")
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");
        let errors = collect_errors(&config);

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": errors,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!("Configuration has {}:", plural(errors.len(), "error")));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {error}"));
            }
        }
        Ok(())
    }
}

/// Field checks plus glob compilation of the conflict rules
fn collect_errors(config: &Config) -> Vec<String> {
    let mut errors: Vec<String> = config.validate().iter().map(ToString::to_string).collect();
    if let Err(e) = PolicyEngine::validate_rules(&config.conflicts.rules) {
        errors.push(format!("conflicts.rules: {e}"));
    }
    errors
}

#[cfg(test)]
mod tests {
    use notesync_core::config::ConfigBuilder;
    use notesync_core::domain::ConflictResolution;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(collect_errors(&Config::default()).is_empty());
    }

    #[test]
    fn test_field_errors_are_reported() {
        let config = ConfigBuilder::new()
            .max_concurrent_operations(0)
            .default_policy(ConflictResolution::AskUser)
            .build();
        let errors = collect_errors(&config);
        assert!(errors
            .iter()
            .any(|e| e.starts_with("sync.max_concurrent_operations")));
        assert!(errors.iter().any(|e| e.starts_with("conflicts.default_policy")));
    }

    #[test]
    fn test_bad_glob_is_reported() {
        let config = ConfigBuilder::new()
            .conflict_rule("notes/[", ConflictResolution::LocalWins)
            .build();
        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("conflicts.rules"));
    }

    #[test]
    fn test_yaml_roundtrip_of_shown_config() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.sync.max_concurrent_operations,
            Config::default().sync.max_concurrent_operations
        );
    }
}
