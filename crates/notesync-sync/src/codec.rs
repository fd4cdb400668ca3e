//! Plain-text content codec
//!
//! The file stem becomes the remote title and the file text becomes the
//! body, one line per paragraph once the remote adapter splits it. CRLF line
//! endings are folded to LF on the way out; nothing else is rewritten, so a
//! pulled body lands on disk byte for byte.

use notesync_core::domain::SyncPath;
use notesync_core::ports::{IContentCodec, RemoteContent};

/// Title used when a path has no usable stem
const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCodec;

impl PlainTextCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IContentCodec for PlainTextCodec {
    fn encode(&self, path: &SyncPath, bytes: &[u8]) -> RemoteContent {
        let title = path
            .file_stem()
            .filter(|stem| !stem.trim().is_empty())
            .unwrap_or(UNTITLED);
        let text = String::from_utf8_lossy(bytes).replace("\r\n", "\n");
        RemoteContent::new(title, text.into_bytes())
    }

    fn decode(&self, content: &RemoteContent) -> Vec<u8> {
        content.body.clone()
    }
}
