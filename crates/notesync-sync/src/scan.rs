//! Directory scanning for folder pairing
//!
//! A folder is paired by expanding it into one record per eligible file
//! beneath it. Hidden entries, editor temporaries and files the text codec
//! cannot carry are left out.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tracing::{debug, warn};

use notesync_core::domain::SyncPath;

/// Extensions the plain-text codec can carry
pub const SYNCABLE_EXTENSIONS: &[&str] = &["md", "txt", "json", "html"];

/// Whether a file with this name takes part in folder pairing
pub fn is_syncable_name(name: &str) -> bool {
    if name.starts_with('.') || name.starts_with('~') || name.ends_with(".tmp") {
        return false;
    }
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => SYNCABLE_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Every eligible file under `root`, sorted by path
///
/// # Errors
/// Returns the I/O error of the first directory that cannot be read.
pub async fn syncable_files(root: &SyncPath) -> std::io::Result<Vec<SyncPath>> {
    let mut files = Vec::new();
    walk(root, &mut files).await?;
    files.sort();
    debug!(root = %root, files = files.len(), "Directory scanned");
    Ok(files)
}

fn walk<'a>(
    dir: &'a SyncPath,
    files: &'a mut Vec<SyncPath>,
) -> Pin<Box<dyn Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir.as_path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let path = match SyncPath::new(entry_path.clone()) {
                Ok(p) => p,
                Err(err) => {
                    warn!(path = ?entry_path, %err, "Skipping invalid path");
                    continue;
                }
            };
            let name = path.file_name().unwrap_or_default();

            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                if name.starts_with('.') {
                    continue;
                }
                walk(&path, files).await?;
            } else if metadata.is_file() && is_syncable_name(name) {
                files.push(path);
            }
        }
        Ok(())
    })
}
