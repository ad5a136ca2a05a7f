//! Fix audit records
//!
//! Every apply attempt appends a [`FixRecord`], success or not. Records are
//! never mutated in place; a rollback appends a new reversing record, so the
//! log stays forward-only and aggregate stats are a fold over it.

use crate::issue::IssueKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit row for one apply attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRecord {
    pub id: Uuid,
    pub issue_id: u64,
    pub fix_type: IssueKind,
    pub applied_at: DateTime<Utc>,
    /// Acting principal, e.g. "auto-fixer" or "rollback"
    pub applied_by: String,
    /// Snapshot of the prior value, sufficient to undo
    pub before_value: Option<String>,
    pub after_value: String,
    pub success: bool,
    pub error_message: Option<String>,
    /// True iff `before_value` was captured and is non-empty
    pub rollback_available: bool,
}

impl FixRecord {
    pub fn new(
        issue_id: u64,
        fix_type: IssueKind,
        applied_by: impl Into<String>,
        before_value: Option<String>,
        after_value: String,
    ) -> Self {
        let rollback_available = before_value
            .as_deref()
            .is_some_and(|v| !v.is_empty());
        Self {
            id: Uuid::new_v4(),
            issue_id,
            fix_type,
            applied_at: Utc::now(),
            applied_by: applied_by.into(),
            before_value,
            after_value,
            success: true,
            error_message: None,
            rollback_available,
        }
    }

    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }
}

/// Aggregate statistics over the fix record log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixStats {
    pub total_fixes: usize,
    pub successful_fixes: usize,
    pub failed_fixes: usize,
    pub rollback_available: usize,
}

impl FixStats {
    /// Success rate in percent, rounded to two decimals
    pub fn success_rate(&self) -> f64 {
        if self.total_fixes == 0 {
            return 0.0;
        }
        let rate = self.successful_fixes as f64 / self.total_fixes as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

/// Fold the record log into totals
pub fn fix_stats(records: &[FixRecord]) -> FixStats {
    let mut stats = FixStats::default();
    for record in records {
        stats.total_fixes += 1;
        if record.success {
            stats.successful_fixes += 1;
        } else {
            stats.failed_fixes += 1;
        }
        if record.rollback_available {
            stats.rollback_available += 1;
        }
    }
    stats
}
