//! Conflict resolver
//!
//! Turns a classification into at most one [`SyncOperation`]:
//!
//! | Classification | Operation | Direction |
//! |---|---|---|
//! | `LocalNewer` | update (create if never synced) | local → remote |
//! | `RemoteNewer` | update (create if never synced) | remote → local |
//! | `LocalDeleted` | delete | local → remote |
//! | `RemoteDeleted` | delete | remote → local |
//! | `BothModified` | update | bidirectional, needs a resolution |
//! | `NoConflict` | none | |
//!
//! One-way pairings drop operations flowing against them and settle
//! `BothModified` in favour of their source side.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use notesync_core::config::ConflictsConfig;
use notesync_core::domain::{
    ConflictResolution, ConflictSummary, ConflictType, Observation, OperationType,
    SyncDirection, SyncOperation, SyncRecord,
};
use notesync_core::ports::IConflictDecider;

use crate::policy::PolicyEngine;

fn one_way(
    record: &SyncRecord,
    operation_type: OperationType,
    direction: SyncDirection,
    conflict_type: ConflictType,
) -> Option<SyncOperation> {
    if !record.sync_direction.permits(direction) {
        debug!(
            path = %record.local_path,
            pairing = %record.sync_direction,
            direction = %direction,
            "Dropping operation against one-way pairing"
        );
        return None;
    }
    Some(SyncOperation::new(
        operation_type,
        record,
        direction,
        conflict_type,
    ))
}

/// Map a classification onto the operation that reconciles it
///
/// Never-synced `LocalNewer` / `RemoteNewer` always have an absent target
/// side, so they become creates.
pub fn plan(classification: ConflictType, record: &SyncRecord) -> Option<SyncOperation> {
    let write = if record.is_never_synced() {
        OperationType::Create
    } else {
        OperationType::Update
    };

    match classification {
        ConflictType::NoConflict => None,
        ConflictType::LocalNewer => one_way(
            record,
            write,
            SyncDirection::LocalToRemote,
            classification,
        ),
        ConflictType::RemoteNewer => one_way(
            record,
            write,
            SyncDirection::RemoteToLocal,
            classification,
        ),
        ConflictType::LocalDeleted => one_way(
            record,
            OperationType::Delete,
            SyncDirection::LocalToRemote,
            classification,
        ),
        ConflictType::RemoteDeleted => one_way(
            record,
            OperationType::Delete,
            SyncDirection::RemoteToLocal,
            classification,
        ),
        ConflictType::BothModified => {
            let (direction, resolution) = match record.sync_direction {
                SyncDirection::Bidirectional => {
                    (SyncDirection::Bidirectional, ConflictResolution::AskUser)
                }
                SyncDirection::LocalToRemote => {
                    (SyncDirection::LocalToRemote, ConflictResolution::LocalWins)
                }
                SyncDirection::RemoteToLocal => {
                    (SyncDirection::RemoteToLocal, ConflictResolution::RemoteWins)
                }
            };
            Some(
                SyncOperation::new(OperationType::Update, record, direction, classification)
                    .with_resolution(resolution),
            )
        }
    }
}

/// Settles true conflicts through the decision callback and policy rules
pub struct ConflictResolver {
    policy: PolicyEngine,
    decider: Option<Arc<dyn IConflictDecider>>,
    decision_timeout: Duration,
}

impl ConflictResolver {
    pub fn new(policy: PolicyEngine, decision_timeout: Duration) -> Self {
        Self {
            policy,
            decider: None,
            decision_timeout,
        }
    }

    pub fn from_config(config: &ConflictsConfig) -> Self {
        Self::new(
            PolicyEngine::from_config(config),
            Duration::from_secs(config.decision_timeout_secs),
        )
    }

    #[must_use]
    pub fn with_decider(mut self, decider: Arc<dyn IConflictDecider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Resolution for a conflict: the callback's answer when it gives a
    /// concrete one in time, the policy otherwise
    pub async fn decide(&self, summary: &ConflictSummary) -> ConflictResolution {
        if let Some(decider) = &self.decider {
            match tokio::time::timeout(self.decision_timeout, decider.decide(summary)).await {
                Ok(Some(resolution)) if resolution.is_decided() => {
                    info!(
                        path = %summary.local_path,
                        resolution = %resolution,
                        "Conflict decided by callback"
                    );
                    return resolution;
                }
                Ok(_) => {
                    debug!(path = %summary.local_path, "Callback left conflict undecided");
                }
                Err(_) => {
                    warn!(
                        path = %summary.local_path,
                        timeout_secs = self.decision_timeout.as_secs(),
                        "Conflict decision timed out"
                    );
                }
            }
        }

        let resolution = self.policy.evaluate(&summary.local_path);
        info!(
            path = %summary.local_path,
            resolution = %resolution,
            "Conflict decided by policy"
        );
        resolution
    }

    /// Plan the operation for `classification` and settle any conflict it
    /// carries
    pub async fn resolve(
        &self,
        classification: ConflictType,
        record: &SyncRecord,
        observation: &Observation,
    ) -> Option<SyncOperation> {
        let operation = plan(classification, record)?;
        if operation.is_dispatchable() {
            return Some(operation);
        }
        let summary = ConflictSummary::new(record, observation);
        let resolution = self.decide(&summary).await;
        Some(operation.with_resolution(resolution))
    }
}

#[cfg(test)]
mod tests {
    use notesync_core::domain::{NewSyncRecord, RemoteId, RemoteKind};

    use super::*;

    fn record(direction: SyncDirection, synced: bool) -> SyncRecord {
        let mut record = SyncRecord::new(NewSyncRecord::new(
            "/a.md".parse().unwrap(),
            RemoteId::new("R1".into()).unwrap(),
            RemoteKind::Item,
            direction,
        ));
        if synced {
            record.last_sync_time = Some(chrono::Utc::now());
        }
        record
    }

    #[test]
    fn test_no_conflict_builds_nothing() {
        for direction in SyncDirection::ALL {
            assert!(plan(ConflictType::NoConflict, &record(*direction, true)).is_none());
        }
    }

    #[test]
    fn test_bidirectional_mapping() {
        let rec = record(SyncDirection::Bidirectional, true);
        let cases = [
            (ConflictType::LocalNewer, OperationType::Update, SyncDirection::LocalToRemote),
            (ConflictType::RemoteNewer, OperationType::Update, SyncDirection::RemoteToLocal),
            (ConflictType::LocalDeleted, OperationType::Delete, SyncDirection::LocalToRemote),
            (ConflictType::RemoteDeleted, OperationType::Delete, SyncDirection::RemoteToLocal),
            (ConflictType::BothModified, OperationType::Update, SyncDirection::Bidirectional),
        ];
        for (classification, op_type, direction) in cases {
            let op = plan(classification, &rec).unwrap();
            assert_eq!(op.operation_type, op_type, "{classification}");
            assert_eq!(op.direction, direction, "{classification}");
            assert_eq!(op.conflict_type, classification);
        }
    }

    #[test]
    fn test_both_modified_waits_for_decision() {
        let op = plan(
            ConflictType::BothModified,
            &record(SyncDirection::Bidirectional, true),
        )
        .unwrap();
        assert_eq!(op.resolution, Some(ConflictResolution::AskUser));
        assert!(!op.is_dispatchable());
    }

    #[test]
    fn test_never_synced_becomes_create() {
        let rec = record(SyncDirection::Bidirectional, false);
        let op = plan(ConflictType::LocalNewer, &rec).unwrap();
        assert_eq!(op.operation_type, OperationType::Create);
        let op = plan(ConflictType::RemoteNewer, &rec).unwrap();
        assert_eq!(op.operation_type, OperationType::Create);
    }

    #[test]
    fn test_one_way_drops_contradicting_operations() {
        let push_only = record(SyncDirection::LocalToRemote, true);
        assert!(plan(ConflictType::RemoteNewer, &push_only).is_none());
        assert!(plan(ConflictType::RemoteDeleted, &push_only).is_none());
        assert!(plan(ConflictType::LocalNewer, &push_only).is_some());

        let pull_only = record(SyncDirection::RemoteToLocal, true);
        assert!(plan(ConflictType::LocalNewer, &pull_only).is_none());
        assert!(plan(ConflictType::LocalDeleted, &pull_only).is_none());
        assert!(plan(ConflictType::RemoteDeleted, &pull_only).is_some());
    }

    #[test]
    fn test_one_way_conflict_favours_source() {
        let op = plan(
            ConflictType::BothModified,
            &record(SyncDirection::LocalToRemote, true),
        )
        .unwrap();
        assert_eq!(op.direction, SyncDirection::LocalToRemote);
        assert_eq!(op.resolution, Some(ConflictResolution::LocalWins));
        assert!(op.is_dispatchable());

        let op = plan(
            ConflictType::BothModified,
            &record(SyncDirection::RemoteToLocal, true),
        )
        .unwrap();
        assert_eq!(op.resolution, Some(ConflictResolution::RemoteWins));
    }
}
