//! notesync Sync - synchronization engine
//!
//! Provides:
//! - Run orchestration with a Collecting/Classifying/Resolving/Executing
//!   state machine and broadcast events
//! - Bounded-concurrency execution of sync operations
//! - Exponential-backoff retry of transient failures
//! - Local filesystem adapter (atomic writes, streaming SHA-256)
//! - Plain-text content codec
//! - Directory scanning for folder pairing
//!
//! ## Modules
//!
//! - [`engine`] - Run orchestration
//! - [`executor`] - Operation execution and record bookkeeping
//! - [`filesystem`] - Local filesystem adapter
//! - [`scan`] - Eligible files under a paired folder

pub mod codec;
pub mod engine;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod retry;
pub mod scan;

pub use codec::PlainTextCodec;
pub use engine::{EnginePorts, RunReport, SyncEngine};
pub use error::{OperationError, SyncError};
pub use executor::{ExecutionSummary, OperationExecutor, OperationOutcome, ProgressCallback};
pub use filesystem::LocalFileSystemAdapter;
pub use retry::{with_retry, RetryPolicy};
pub use scan::{is_syncable_name, syncable_files};
