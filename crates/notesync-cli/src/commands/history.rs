//! History command - Show past sync operations for a file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use notesync_core::domain::SyncHistoryEntry;
use notesync_core::ports::IMetadataStore;

use crate::context::{resolve_path, AppContext};

#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Paired local file
    pub path: PathBuf,

    /// Number of entries to show, newest first
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: u32,
}

fn entry_json(entry: &SyncHistoryEntry) -> serde_json::Value {
    serde_json::json!({
        "operation_type": entry.operation_type.to_string(),
        "direction": entry.direction.to_string(),
        "conflict_type": entry.conflict_type.to_string(),
        "resolution": entry.resolution.map(|r| r.to_string()),
        "started_at": entry.started_at.to_rfc3339(),
        "completed_at": entry.completed_at.to_rfc3339(),
        "success": entry.success,
        "error_message": entry.error_message,
    })
}

fn entry_line(entry: &SyncHistoryEntry) -> String {
    let mut line = format!(
        "{} {} {} {:<15}",
        entry.started_at.format("%Y-%m-%d %H:%M:%S"),
        if entry.success { "ok  " } else { "FAIL" },
        entry.operation_type,
        entry.direction,
    );
    if let Some(resolution) = entry.resolution {
        line.push_str(&format!(" [{} -> {}]", entry.conflict_type, resolution));
    }
    if let Some(error) = &entry.error_message {
        line.push_str(&format!(" {error}"));
    }
    line
}

impl HistoryCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let path = resolve_path(&self.path)?;
        let store = ctx.open_store().await?;

        let entries = store
            .history(&path, self.limit)
            .await
            .context("Failed to read sync history")?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "local_path": path.to_string(),
                "entries": entries.iter().map(entry_json).collect::<Vec<_>>(),
            }));
        } else if entries.is_empty() {
            formatter.success(&format!("No history for {path}"));
        } else {
            formatter.success(&format!("History for {path}"));
            for entry in &entries {
                formatter.info(&entry_line(entry));
            }
        }
        Ok(())
    }
}
