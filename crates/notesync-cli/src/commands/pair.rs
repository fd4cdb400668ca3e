//! Pair and unpair commands - manage the local/remote correspondence
//!
//! `notesync pair <path> <remote-id>` pairs a local file with an existing
//! remote page. `notesync pair <path> --parent <id>` pairs it with a page
//! that the first sync creates under `<id>`. `notesync pair <dir> --parent
//! <id> --recursive` pairs every eligible file beneath a folder the same way.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use notesync_core::domain::{
    NewSyncRecord, RemoteId, RemoteKind, SyncDirection, SyncPath, SyncRecord,
};
use notesync_core::ports::{IMetadataStore, StoreError};
use notesync_sync::syncable_files;

use crate::context::{resolve_path, AppContext};
use crate::output::plural;

#[derive(Debug, Args)]
pub struct PairCommand {
    /// Local file to pair, or a folder with --recursive
    pub path: PathBuf,

    /// ID of an existing remote page or collection
    #[arg(required_unless_present = "parent", conflicts_with = "parent")]
    pub remote_id: Option<String>,

    /// Create the remote page under this parent on the first sync
    #[arg(long)]
    pub parent: Option<String>,

    /// Remote object kind: item or collection
    #[arg(long, default_value = "item")]
    pub kind: RemoteKind,

    /// local_to_remote, remote_to_local or bidirectional
    #[arg(long, default_value = "bidirectional")]
    pub direction: SyncDirection,

    /// Pair every eligible file under the folder, each as a new page under --parent
    #[arg(short, long, requires = "parent")]
    pub recursive: bool,
}

impl PairCommand {
    fn new_record(&self) -> Result<NewSyncRecord> {
        let local_path = resolve_path(&self.path)?;
        let record = match (&self.remote_id, &self.parent) {
            (Some(id), _) => NewSyncRecord::new(
                local_path,
                RemoteId::new(id.clone()).context("Invalid remote ID")?,
                self.kind,
                self.direction,
            ),
            (None, Some(parent)) => NewSyncRecord::new(
                local_path,
                RemoteId::pending(),
                self.kind,
                self.direction,
            )
            .with_parent(RemoteId::new(parent.clone()).context("Invalid parent ID")?),
            (None, None) => bail!("Either a remote ID or --parent is required"),
        };
        Ok(record)
    }

    /// One pending record per scanned file, each under `--parent`
    fn folder_records(&self, files: Vec<SyncPath>) -> Result<Vec<NewSyncRecord>> {
        if self.kind != RemoteKind::Item {
            bail!("Folder pairing creates item pages; --kind {} is not allowed", self.kind);
        }
        let Some(parent) = &self.parent else {
            bail!("Folder pairing requires --parent");
        };
        let parent = RemoteId::new(parent.clone()).context("Invalid parent ID")?;
        Ok(files
            .into_iter()
            .map(|path| {
                NewSyncRecord::new(path, RemoteId::pending(), RemoteKind::Item, self.direction)
                    .with_parent(parent.clone())
            })
            .collect())
    }

    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        if self.recursive {
            return self.execute_folder(ctx).await;
        }
        let is_dir = tokio::fs::metadata(&self.path)
            .await
            .is_ok_and(|m| m.is_dir());
        if is_dir {
            bail!(
                "{} is a directory; pass --recursive to pair the files inside it",
                self.path.display()
            );
        }

        let formatter = ctx.formatter();
        let new = self.new_record()?;
        let store = ctx.open_store().await?;

        let record = match store.create(new).await {
            Ok(record) => record,
            Err(StoreError::DuplicatePath(path)) => bail!("{path} is already paired"),
            Err(e) => return Err(e).context("Failed to create pairing"),
        };
        info!(path = %record.local_path, remote_id = %record.remote_id, "Pairing created");

        if ctx.is_json() {
            formatter.print_json(&record_json(&record));
        } else {
            formatter.success(&format!("Paired {}", record.local_path));
            match &record.remote_parent_id {
                Some(parent) if record.remote_id.is_pending() => formatter.info(&format!(
                    "Remote page will be created under {parent} on the next sync"
                )),
                _ => formatter.info(&format!("Remote: {}", record.remote_id)),
            }
            formatter.info(&format!("Direction: {}", record.sync_direction));
        }
        Ok(())
    }

    /// Files already paired are skipped, so a rerun picks up only new files
    async fn execute_folder(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let root = resolve_path(&self.path)?;
        let files = syncable_files(&root)
            .await
            .with_context(|| format!("Failed to scan {root}"))?;
        if files.is_empty() {
            bail!("No syncable files under {root}");
        }
        let records = self.folder_records(files)?;
        let store = ctx.open_store().await?;

        let mut paired = Vec::new();
        let mut skipped = Vec::new();
        for new in records {
            match store.create(new).await {
                Ok(record) => paired.push(record),
                Err(StoreError::DuplicatePath(path)) => {
                    warn!(path = %path, "Already paired, skipping");
                    skipped.push(path);
                }
                Err(e) => return Err(e).context("Failed to create pairing"),
            }
        }
        info!(root = %root, paired = paired.len(), skipped = skipped.len(), "Folder paired");

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "root": root.to_string(),
                "paired": paired.iter().map(record_json).collect::<Vec<_>>(),
                "skipped": skipped.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }));
        } else {
            formatter.success(&format!(
                "Paired {} under {root}",
                plural(paired.len(), "file")
            ));
            for record in &paired {
                formatter.info(&record.local_path.to_string());
            }
            if !skipped.is_empty() {
                formatter.warn(&format!("{} already paired", plural(skipped.len(), "file")));
            }
            if let Some(parent) = &self.parent {
                formatter.info(&format!(
                    "Remote pages will be created under {parent} on the next sync"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct UnpairCommand {
    /// Local file to stop synchronizing
    pub path: PathBuf,
}

impl UnpairCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let formatter = ctx.formatter();
        let path = resolve_path(&self.path)?;
        let store = ctx.open_store().await?;

        match store.delete(&path).await {
            Ok(()) => {
                info!(path = %path, "Pairing removed");
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "local_path": path.to_string(),
                    }));
                } else {
                    formatter.success(&format!("Unpaired {path}"));
                    formatter.info("Neither the local file nor the remote page was changed");
                }
            }
            Err(StoreError::NotFound(_)) => bail!("{path} is not paired"),
            Err(e) => return Err(e).context("Failed to remove pairing"),
        }
        Ok(())
    }
}

pub fn record_json(record: &SyncRecord) -> serde_json::Value {
    serde_json::json!({
        "local_path": record.local_path.to_string(),
        "remote_id": record.remote_id.to_string(),
        "remote_kind": record.remote_kind.to_string(),
        "remote_parent_id": record.remote_parent_id.as_ref().map(ToString::to_string),
        "sync_direction": record.sync_direction.to_string(),
        "last_sync_time": record.last_sync_time.map(|t| t.to_rfc3339()),
        "conflict_status": record.conflict_status.to_string(),
        "sync_status": record.sync_status.to_string(),
        "last_error": record.last_error,
        "retry_count": record.retry_count,
    })
}
