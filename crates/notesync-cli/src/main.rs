//! notesync CLI - Command-line runner for notesync
//!
//! Provides commands for:
//! - Pairing local files with remote pages
//! - Running synchronization once or continuously
//! - Viewing pairing status and per-file history
//! - Inspecting and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use notesync_core::config::{Config, LogFormat};

mod commands;
mod context;
mod output;

use commands::{
    config::ConfigCommand,
    history::HistoryCommand,
    pair::{PairCommand, UnpairCommand},
    status::StatusCommand,
    sync::SyncCommand,
};
use context::AppContext;
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "notesync",
    version,
    about = "Keep local files and workspace pages in sync"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pair a local file with a remote page
    Pair(PairCommand),
    /// Remove a pairing, leaving both sides untouched
    Unpair(UnpairCommand),
    /// Show pairing and synchronization status
    Status(StatusCommand),
    /// Show past sync operations for a file
    History(HistoryCommand),
    /// Synchronize paired files
    Sync(SyncCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Filter directive: `-v` flags win over the configured level
fn log_directive(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_tracing(cli: &Cli, config: &Config) {
    let directive = log_directive(cli.verbose, &config.logging.level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    // Logs go to stderr so `--json` output stays parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let ctx = match AppContext::load(cli.config.as_deref(), format, cli.quiet) {
        Ok(ctx) => ctx,
        Err(e) => {
            get_formatter(format, cli.quiet).error(&format!("{e:#}"));
            std::process::exit(2);
        }
    };
    init_tracing(&cli, &ctx.config);

    match &cli.command {
        Commands::Pair(cmd) => cmd.execute(&ctx).await,
        Commands::Unpair(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::History(cmd) => cmd.execute(&ctx).await,
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["notesync", "status", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_sync_flags() {
        let cli =
            Cli::try_parse_from(["notesync", "sync", "--watch", "--interactive"]).unwrap();
        match cli.command {
            Commands::Sync(cmd) => {
                assert!(cmd.watch);
                assert!(cmd.interactive);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from(["notesync", "config", "validate"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Validate)));
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive(0, "warn"), "warn");
        assert_eq!(log_directive(1, "warn"), "debug");
        assert_eq!(log_directive(3, "warn"), "trace");
    }
}
