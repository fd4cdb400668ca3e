//! Conflict decision callback port

use crate::domain::{ConflictResolution, ConflictSummary};

/// Supplies a resolution for a conflict, typically by asking a person
///
/// Returning `None` (or `AskUser`) leaves the decision to the configured
/// default policy. Callers bound the wait with their own timeout.
#[async_trait::async_trait]
pub trait IConflictDecider: Send + Sync {
    async fn decide(&self, summary: &ConflictSummary) -> Option<ConflictResolution>;
}
