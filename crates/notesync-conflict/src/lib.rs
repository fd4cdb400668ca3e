//! notesync Conflict - Change classification and conflict resolution
//!
//! Provides:
//! - Classification of a pairing's change state from both sides' observations
//! - Mapping of classifications to synchronization operations
//! - Decision callback with timeout, glob policy rules and a default policy
//! - Duplicate naming for keep-both resolutions

pub mod classifier;
pub mod decider;
pub mod error;
pub mod namer;
pub mod policy;
pub mod resolver;

pub use classifier::{classify, ChangeClassifier};
pub use decider::{ChannelConflictDecider, ConflictPrompt};
pub use error::ConflictError;
pub use namer::ConflictNamer;
pub use policy::PolicyEngine;
pub use resolver::{plan, ConflictResolver};
