//! notesync core - domain types and port definitions
//!
//! This crate holds everything the other notesync crates agree on:
//! - **Domain types** - `SyncRecord`, `SyncOperation`, `ConflictType`, `ConflictResolution`
//! - **Port definitions** - `IMetadataStore`, `IRemoteStore`, `ILocalFileSystem`,
//!   `IContentCodec`, `IConflictDecider`
//! - **Events** - `SyncEvent` and the run state machine vocabulary
//! - **Configuration** - the YAML configuration file model
//!
//! # Architecture
//!
//! Ports and adapters: the domain module has no I/O. Adapter crates
//! (`notesync-store`, `notesync-remote`, `notesync-sync`) implement the ports
//! and the engine only talks to them through these traits.

pub mod config;
pub mod domain;
pub mod ports;
