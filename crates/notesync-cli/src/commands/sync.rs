//! Sync command - Synchronize paired files with the remote workspace
//!
//! Provides the `notesync sync` CLI command which:
//! 1. Opens the database and builds the remote client from the token
//! 2. Wraps the client in the TTL cache, restoring its snapshot if configured
//! 3. Runs the SyncEngine once, or every poll interval with `--watch`
//! 4. Asks about conflicts on the terminal with `--interactive`
//! 5. Displays results and persists the cache snapshot

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use notesync_cache::{CacheTtls, CachedObject, CachedRemoteStore, TtlCache};
use notesync_conflict::{ChannelConflictDecider, ConflictPrompt};
use notesync_core::domain::{ConflictResolution, ConflictSummary};
use notesync_core::ports::SyncEvent;
use notesync_sync::{EnginePorts, LocalFileSystemAdapter, PlainTextCodec, RunReport, SyncEngine};

use crate::context::AppContext;
use crate::output::{plural, OutputFormatter};

/// Prompts buffered while the terminal is busy with an earlier one
const PROMPT_BUFFER: usize = 8;

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Keep running, synchronizing every `sync.poll_interval` seconds
    #[arg(long)]
    pub watch: bool,

    /// Ask on the terminal how to settle each conflict
    #[arg(long)]
    pub interactive: bool,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = &ctx.config;

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.error(&error.to_string());
            }
            bail!(
                "Invalid configuration ({}), see 'notesync config validate'",
                plural(errors.len(), "error")
            );
        }

        let store = ctx.open_store().await?;
        let client = Arc::new(ctx.remote_client()?);

        let cache: Arc<TtlCache<CachedObject>> = Arc::new(TtlCache::new(
            config.cache.max_entries,
            Duration::from_secs(config.cache.item_ttl_secs),
        ));
        if let Some(path) = &config.cache.snapshot_path {
            // A bad snapshot only costs a cold cache
            if let Err(e) = cache.load_snapshot(path).await {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache snapshot");
            }
        }
        let remote = Arc::new(CachedRemoteStore::new(
            client,
            cache.clone(),
            CacheTtls::from(&config.cache),
        ));

        let shutdown = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(
            Duration::from_secs(config.cache.sweep_interval_secs),
            shutdown.clone(),
        );

        let mut engine = SyncEngine::new(
            EnginePorts {
                store,
                local: Arc::new(LocalFileSystemAdapter::new()),
                remote,
                codec: Arc::new(PlainTextCodec::new()),
            },
            config,
        );
        if self.interactive {
            let (decider, prompts) = ChannelConflictDecider::new(PROMPT_BUFFER);
            engine = engine.with_decider(Arc::new(decider));
            tokio::spawn(answer_prompts(prompts));
        }
        let engine = Arc::new(engine);

        let printer = tokio::spawn(print_events(
            engine.subscribe(),
            shutdown.clone(),
            ctx.is_json() || ctx.quiet,
        ));

        let result = if self.watch {
            self.watch(&engine, &shutdown, ctx).await;
            Ok(())
        } else {
            match engine.run().await {
                Ok(report) => {
                    show_report(ctx, &*formatter, &report);
                    Ok(())
                }
                Err(e) => Err(e).context("Synchronization failed"),
            }
        };

        shutdown.cancel();
        let _ = sweeper.await;
        let _ = printer.await;

        if let Some(path) = &config.cache.snapshot_path {
            match cache.save_snapshot(path).await {
                Ok(saved) => info!(path = %path.display(), saved, "Cache snapshot saved"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to save cache snapshot"),
            }
        }

        result
    }

    async fn watch(&self, engine: &Arc<SyncEngine>, shutdown: &CancellationToken, ctx: &AppContext) {
        let interval = Duration::from_secs(ctx.config.sync.poll_interval);
        ctx.formatter().info(&format!(
            "Watching, synchronizing every {}s. Press Ctrl-C to stop.",
            interval.as_secs()
        ));

        let stopper = {
            let engine = engine.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    signal = tokio::signal::ctrl_c() => {
                        if let Err(e) = signal {
                            warn!(error = %e, "Failed to listen for Ctrl-C");
                        }
                        info!("Stop requested");
                        engine.cancel();
                        shutdown.cancel();
                    }
                }
            })
        };

        engine.run_periodically(interval, shutdown.clone()).await;
        stopper.abort();
    }
}

/// Print progress and conflicts until `shutdown`
///
/// Events already queued when `shutdown` fires are still printed.
async fn print_events(
    mut events: broadcast::Receiver<SyncEvent>,
    shutdown: CancellationToken,
    silent: bool,
) {
    loop {
        let received = tokio::select! {
            biased;
            received = events.recv() => received,
            _ = shutdown.cancelled() => return,
        };
        let event = match received {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress display fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        if silent {
            continue;
        }
        match event {
            SyncEvent::SyncStarted => eprintln!("  Synchronizing..."),
            SyncEvent::SyncProgress { percent, message } => {
                eprintln!("  [{percent:>3}%] {message}");
            }
            SyncEvent::ConflictDetected(summary) => {
                eprintln!("\u{26a0} Conflict: {}", summary.local_path);
            }
            SyncEvent::SyncFinished { .. } | SyncEvent::StateChanged { .. } => {}
        }
    }
}

fn parse_answer(line: &str) -> Option<ConflictResolution> {
    match line.trim().to_ascii_lowercase().as_str() {
        "l" | "local" => Some(ConflictResolution::LocalWins),
        "r" | "remote" => Some(ConflictResolution::RemoteWins),
        "b" | "both" => Some(ConflictResolution::CreateBoth),
        "s" | "skip" => Some(ConflictResolution::Skip),
        _ => None,
    }
}

fn describe(summary: &ConflictSummary) -> String {
    let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into())
    };
    format!(
        "{} changed on both sides\n    local:  {}\n    remote: {} ({})\n    last sync: {}",
        summary.local_path,
        time(summary.local_modified),
        time(summary.remote_modified),
        summary.remote_id,
        time(summary.last_sync_time),
    )
}

/// Answer conflict prompts from stdin
///
/// An unrecognized answer or closed stdin leaves the conflict to the
/// configured policy.
async fn answer_prompts(mut prompts: mpsc::Receiver<ConflictPrompt>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(prompt) = prompts.recv().await {
        eprintln!("\u{26a0} {}", describe(&prompt.summary));
        eprint!("  Keep [l]ocal, [r]emote, [b]oth, or [s]kip? ");

        match lines.next_line().await {
            Ok(Some(line)) => match parse_answer(&line) {
                Some(resolution) => prompt.respond(resolution),
                None => eprintln!("  Unrecognized answer, applying the configured policy"),
            },
            Ok(None) => {
                eprintln!();
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read conflict answer");
                return;
            }
        }
    }
}

fn show_report(ctx: &AppContext, formatter: &dyn OutputFormatter, report: &RunReport) {
    if ctx.is_json() {
        match serde_json::to_value(report) {
            Ok(json) => formatter.print_json(&json),
            Err(e) => formatter.error(&format!("Failed to serialize report: {e}")),
        }
        return;
    }

    let stats = &report.statistics;
    let duration = if report.duration_ms >= 1000 {
        format!("{:.1}s", report.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", report.duration_ms)
    };

    if stats.total == 0 {
        formatter.success("Already up to date");
    } else {
        formatter.success(&format!("Sync completed in {duration}"));
    }

    if stats.completed > 0 {
        formatter.info(&format!("Synchronized: {}", plural(stats.completed, "file")));
    }
    if report.execution.skipped > 0 {
        formatter.info(&format!(
            "Skipped:      {} (run 'notesync status')",
            plural(report.execution.skipped, "conflict")
        ));
    }
    if report.execution.cancelled > 0 {
        formatter.info(&format!(
            "Cancelled:    {}",
            plural(report.execution.cancelled, "operation")
        ));
    }
    if report.unchanged > 0 {
        formatter.info(&format!("Unchanged:    {}", plural(report.unchanged, "file")));
    }
    if stats.failed > 0 {
        formatter.error(&format!(
            "{} failed, see 'notesync status' for details",
            plural(stats.failed, "file")
        ));
    }
}
