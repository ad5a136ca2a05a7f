//! Fix application and rollback
//!
//! The only component that mutates target resources. Every apply attempt
//! captures a snapshot first and appends an audit record whether or not the
//! write succeeded; the issue then moves to exactly one of fixed or failed.
//! Rollback re-applies the snapshot through the same write path and appends
//! a reversing record, keeping the audit log forward-only.

use crate::error::FixError;
use crate::generate::ProposedFix;
use crate::issue::{Issue, IssueStatus};
use crate::record::{fix_stats, FixRecord, FixStats};
use crate::store::{IssueStore, RecordStore, ResourceStore};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_ACTOR: &str = "auto-fixer";
const ROLLBACK_ACTOR: &str = "rollback";

/// Outcome of one apply attempt
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub issue_id: u64,
    pub record_id: Uuid,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Commits approved fixes to their target resources
pub struct FixApplier {
    issues: Arc<dyn IssueStore>,
    records: Arc<dyn RecordStore>,
    resources: Arc<dyn ResourceStore>,
    actor: String,
}

impl FixApplier {
    pub fn new(
        issues: Arc<dyn IssueStore>,
        records: Arc<dyn RecordStore>,
        resources: Arc<dyn ResourceStore>,
    ) -> Self {
        Self {
            issues,
            records,
            resources,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }

    /// Acting principal recorded on audit rows
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Apply one approved fix.
    ///
    /// Mutation failures are downgraded to a failed record plus a `Failed`
    /// issue status; they never abort the batch. The returned error covers
    /// only store-level failures (the record or status update itself).
    pub fn apply(&self, issue: &Issue, fix: &ProposedFix) -> anyhow::Result<ApplyResult> {
        let field = issue.kind.field();

        let before_value = match field {
            Some(field) => match self.resources.read_field(&issue.target, field) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!("snapshot read failed for issue {}: {}", issue.id, err);
                    None
                }
            },
            None => None,
        };

        let after_value = fix.stored_value();
        let write_result = match field {
            Some(field) => self
                .resources
                .write_field(&issue.target, field, &after_value)
                .map_err(|e| e.to_string()),
            None => Err(FixError::NoApplyLogic(issue.kind).to_string()),
        };

        let success = write_result.is_ok();
        let error_message = write_result.err();

        let mut record = FixRecord::new(
            issue.id,
            issue.kind,
            self.actor.clone(),
            before_value,
            after_value,
        );
        if let Some(message) = &error_message {
            record = record.failed(message.clone());
            tracing::warn!("fix for issue {} failed: {}", issue.id, message);
        }
        let record_id = self.records.append(record)?;

        let status = if success {
            IssueStatus::Fixed
        } else {
            IssueStatus::Failed
        };
        self.issues.update_status(issue.id, status)?;

        Ok(ApplyResult {
            issue_id: issue.id,
            record_id,
            success,
            error_message,
        })
    }

    /// Restore the snapshot captured by an earlier fix.
    ///
    /// Appends a reversing record instead of touching the original row, and
    /// reopens the issue for another fix attempt.
    pub fn rollback(&self, record_id: Uuid) -> Result<(), FixError> {
        let record = self
            .records
            .get(record_id)?
            .filter(|r| r.rollback_available)
            .ok_or(FixError::FixNotFound(record_id))?;

        let issue = self
            .issues
            .get(record.issue_id)?
            .ok_or(FixError::IssueNotFound(record.issue_id))?;

        let field = record
            .fix_type
            .field()
            .ok_or(FixError::NoApplyLogic(record.fix_type))?;

        // rollback_available guarantees the snapshot is present and non-empty
        let before_value = record.before_value.clone().unwrap_or_default();
        self.resources
            .write_field(&issue.target, field, &before_value)?;

        let mut reversing = FixRecord::new(
            record.issue_id,
            record.fix_type,
            ROLLBACK_ACTOR,
            Some(record.after_value.clone()),
            before_value,
        );
        reversing.rollback_available = false;
        self.records.append(reversing)?;

        self.issues
            .update_status(issue.id, IssueStatus::Pending)?;
        Ok(())
    }

    /// Fold the audit log into aggregate totals
    pub fn stats(&self) -> anyhow::Result<FixStats> {
        Ok(fix_stats(&self.records.all()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueKind, ResourceField, ResourceRef};
    use crate::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, FixApplier) {
        let store = Arc::new(MemoryStore::new());
        store.insert_resource(10, "How to Roast Coffee");
        let applier = FixApplier::new(store.clone(), store.clone(), store.clone());
        (store, applier)
    }

    fn meta_issue(store: &MemoryStore) -> Issue {
        let issue = Issue::new(
            1,
            IssueKind::MissingMetaDescription,
            ResourceRef::post(10),
            "No meta description",
        );
        store.insert_issue(issue.clone());
        issue
    }

    #[test]
    fn test_apply_snapshots_and_transitions_to_fixed() {
        let (store, applier) = setup();
        store.set_field(10, ResourceField::MetaDescription, "old description");
        let issue = meta_issue(&store);

        let result = applier
            .apply(&issue, &ProposedFix::Text("new description".to_string()))
            .unwrap();
        assert!(result.success);

        assert_eq!(
            store.field(10, ResourceField::MetaDescription),
            Some("new description".to_string())
        );
        let record = RecordStore::get(&*store, result.record_id).unwrap().unwrap();
        assert!(record.success);
        assert_eq!(record.before_value, Some("old description".to_string()));
        assert!(record.rollback_available);

        let issue = IssueStore::get(&*store, 1).unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::Fixed);
    }

    #[test]
    fn test_apply_without_prior_value_has_no_rollback() {
        let (store, applier) = setup();
        let issue = meta_issue(&store);

        let result = applier
            .apply(&issue, &ProposedFix::Text("new description".to_string()))
            .unwrap();
        assert!(result.success);

        let record = RecordStore::get(&*store, result.record_id).unwrap().unwrap();
        assert!(!record.rollback_available);
        assert!(applier.rollback(result.record_id).is_err());
    }

    #[test]
    fn test_apply_write_failure_records_and_marks_failed() {
        let store = Arc::new(MemoryStore::new());
        let applier = FixApplier::new(store.clone(), store.clone(), store.clone());
        // Resource 404 does not exist, so the write fails
        let issue = Issue::new(
            1,
            IssueKind::MissingMetaDescription,
            ResourceRef::post(404),
            "No meta description",
        );
        store.insert_issue(issue.clone());

        let result = applier
            .apply(&issue, &ProposedFix::Text("new".to_string()))
            .unwrap();
        assert!(!result.success);
        assert!(result.error_message.is_some());

        let record = RecordStore::get(&*store, result.record_id).unwrap().unwrap();
        assert!(!record.success);

        let issue = IssueStore::get(&*store, 1).unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::Failed);
    }

    #[test]
    fn test_apply_kind_without_write_target_records_failure() {
        let (store, applier) = setup();
        let issue = Issue::new(
            1,
            IssueKind::BrokenInternalLink,
            ResourceRef::post(10),
            "Broken link",
        );
        store.insert_issue(issue.clone());

        let result = applier
            .apply(&issue, &ProposedFix::Text("anything".to_string()))
            .unwrap();
        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .contains("no apply logic"));

        let issue = IssueStore::get(&*store, 1).unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::Failed);
    }

    #[test]
    fn test_rollback_round_trip() {
        let (store, applier) = setup();
        store.set_field(10, ResourceField::MetaDescription, "old description");
        let issue = meta_issue(&store);

        let result = applier
            .apply(&issue, &ProposedFix::Text("new description".to_string()))
            .unwrap();
        applier.rollback(result.record_id).unwrap();

        // Prior value restored exactly, issue reopened
        assert_eq!(
            store.field(10, ResourceField::MetaDescription),
            Some("old description".to_string())
        );
        let issue = IssueStore::get(&*store, 1).unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::Pending);

        // Audit log gained a reversing record; the original row is untouched
        let records = store.all().unwrap();
        assert_eq!(records.len(), 2);
        let original = &records[0];
        let reversing = &records[1];
        assert_eq!(original.after_value, "new description");
        assert_eq!(reversing.applied_by, "rollback");
        assert_eq!(reversing.before_value, Some("new description".to_string()));
        assert_eq!(reversing.after_value, "old description");
        assert!(!reversing.rollback_available);
    }

    #[test]
    fn test_rollback_unknown_record() {
        let (_, applier) = setup();
        let result = applier.rollback(Uuid::new_v4());
        assert!(matches!(result, Err(FixError::FixNotFound(_))));
    }

    #[test]
    fn test_rollback_missing_issue() {
        let (store, applier) = setup();
        let record = FixRecord::new(
            99,
            IssueKind::MissingMetaDescription,
            "auto-fixer",
            Some("old".to_string()),
            "new".to_string(),
        );
        let record_id = store.append(record).unwrap();

        let result = applier.rollback(record_id);
        assert!(matches!(result, Err(FixError::IssueNotFound(99))));
    }

    #[test]
    fn test_stats_over_audit_log() {
        let (store, applier) = setup();
        store.set_field(10, ResourceField::MetaDescription, "old");
        let issue = meta_issue(&store);
        applier
            .apply(&issue, &ProposedFix::Text("new".to_string()))
            .unwrap();

        let stats = applier.stats().unwrap();
        assert_eq!(stats.total_fixes, 1);
        assert_eq!(stats.successful_fixes, 1);
        assert_eq!(stats.rollback_available, 1);
    }
}
