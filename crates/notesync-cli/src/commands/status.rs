//! Status command - Display pairings and their synchronization state
//!
//! Without a path, shows counts by status plus the pairings that need
//! attention (unresolved conflicts and failures). With a path, shows that
//! one pairing in full.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use notesync_core::domain::{ConflictStatus, SyncRecord, SyncStatus};
use notesync_core::ports::IMetadataStore;

use crate::commands::pair::record_json;
use crate::context::{resolve_path, AppContext};
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Optional path to check status of a specific file
    pub path: Option<PathBuf>,
}

/// Records per sync status, every status present
fn counts_by_status(records: &[SyncRecord]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> =
        SyncStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for record in records {
        *counts.entry(record.sync_status.as_str()).or_default() += 1;
    }
    counts
}

fn format_time(time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let store = ctx.open_store().await?;

        match &self.path {
            Some(path) => {
                let path = resolve_path(path)?;
                match store.get(&path).await.context("Failed to query pairing")? {
                    Some(record) => show_record(ctx, &*formatter, &record),
                    None => formatter.error(&format!("{path} is not paired")),
                }
            }
            None => {
                let records = store.list_all().await.context("Failed to list pairings")?;
                show_summary(ctx, &*formatter, &records);
            }
        }
        Ok(())
    }
}

fn show_record(ctx: &AppContext, formatter: &dyn OutputFormatter, record: &SyncRecord) {
    if ctx.is_json() {
        formatter.print_json(&record_json(record));
        return;
    }

    formatter.success(&record.local_path.to_string());
    formatter.info(&format!("Remote:      {} ({})", record.remote_id, record.remote_kind));
    if let Some(parent) = &record.remote_parent_id {
        formatter.info(&format!("Parent:      {parent}"));
    }
    formatter.info(&format!("Direction:   {}", record.sync_direction));
    formatter.info(&format!("Status:      {}", record.sync_status));
    formatter.info(&format!("Conflict:    {}", record.conflict_status));
    formatter.info(&format!("Last sync:   {}", format_time(record.last_sync_time)));
    if let Some(error) = &record.last_error {
        formatter.info(&format!("Last error:  {error} (attempt {})", record.retry_count));
    }
}

fn show_summary(ctx: &AppContext, formatter: &dyn OutputFormatter, records: &[SyncRecord]) {
    let counts = counts_by_status(records);
    let conflicts: Vec<&SyncRecord> = records
        .iter()
        .filter(|r| r.conflict_status == ConflictStatus::Detected)
        .collect();
    let failures: Vec<&SyncRecord> = records
        .iter()
        .filter(|r| r.sync_status == SyncStatus::Failed)
        .collect();
    let last_sync = records.iter().filter_map(|r| r.last_sync_time).max();

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "total": records.len(),
            "by_status": counts,
            "conflicts": conflicts.iter().map(|r| r.local_path.to_string()).collect::<Vec<_>>(),
            "failed": failures.iter().map(|r| record_json(r)).collect::<Vec<_>>(),
            "last_sync_time": last_sync.map(|t| t.to_rfc3339()),
        }));
        return;
    }

    if records.is_empty() {
        formatter.success("No pairings yet");
        formatter.info("Run 'notesync pair <path> <remote-id>' to add one");
        return;
    }

    formatter.success(&plural(records.len(), "pairing"));
    for (status, count) in &counts {
        if *count > 0 {
            formatter.info(&format!("{status:<10} {count}"));
        }
    }
    formatter.info(&format!("Last sync: {}", format_time(last_sync)));

    if !conflicts.is_empty() {
        formatter.warn(&format!("{} awaiting a decision:", plural(conflicts.len(), "conflict")));
        for record in &conflicts {
            formatter.info(&format!("  - {}", record.local_path));
        }
    }
    if !failures.is_empty() {
        formatter.error(&format!("{} failed:", plural(failures.len(), "pairing")));
        for record in &failures {
            formatter.info(&format!(
                "  - {}: {}",
                record.local_path,
                record.last_error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
}
