//! Port definitions (hexagonal architecture interfaces)
//!
//! The engine depends on these traits; adapter crates implement them.
//!
//! ## Ports Overview
//!
//! - [`IMetadataStore`] - Durable sync records and history
//! - [`IRemoteStore`] - Rate-limited access to the remote content store
//! - [`ILocalFileSystem`] - Local file reads, writes and digests
//! - [`IContentCodec`] - Translation between file bytes and remote content
//! - [`IConflictDecider`] - External decision callback for true conflicts
//! - [`SyncEvent`] - Events emitted to the surrounding application

pub mod codec;
pub mod decider;
pub mod events;
pub mod local_filesystem;
pub mod metadata_store;
pub mod remote_store;

pub use codec::IContentCodec;
pub use decider::IConflictDecider;
pub use events::{RunState, RunStatistics, SyncEvent};
pub use local_filesystem::ILocalFileSystem;
pub use metadata_store::{IMetadataStore, StoreError};
pub use remote_store::{IRemoteStore, RemoteContent, RemoteError, RemoteMetadata};
