//! Content codec port
//!
//! The engine never interprets document markup itself. It hands local bytes
//! to a codec to obtain remote content, and remote content to the codec to
//! obtain local bytes.

use crate::domain::newtypes::SyncPath;
use crate::ports::remote_store::RemoteContent;

pub trait IContentCodec: Send + Sync {
    /// Build the remote representation of a local file
    fn encode(&self, path: &SyncPath, bytes: &[u8]) -> RemoteContent;

    /// Build local file bytes from remote content
    fn decode(&self, content: &RemoteContent) -> Vec<u8>;
}
