//! Pipeline orchestrator
//!
//! The top-level sequencing: generate fixes for a batch of issues, run batch
//! review, give needs-revision fixes one more chance, check consistency over
//! the final approved set, then apply sequentially. Per-issue failures are
//! collected in the run report and never abort the batch.

use crate::apply::{ApplyResult, FixApplier};
use crate::config::Settings;
use crate::generate::FixGenerator;
use crate::review::{
    disposition, ConsistencyReport, Disposition, PendingFix, QualityGate, ReviewCounts,
    ReviewStats,
};
use crate::store::IssueStore;
use serde::Serialize;
use std::sync::Arc;

/// Aggregate result of one pipeline run
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Fixes that reached the applier
    pub applied: usize,
    /// Fixes the reviewer refused outright
    pub rejected: usize,
    /// Fixes that went through the revision loop
    pub revised: usize,
    pub consistency: ConsistencyReport,
    pub results: Vec<ApplyResult>,
    /// Per-issue errors: generation failures, skipped issues, store errors
    pub errors: Vec<String>,
    pub review: ReviewCounts,
    pub review_stats: ReviewStats,
}

impl RunReport {
    fn empty(errors: Vec<String>, review_stats: ReviewStats) -> Self {
        Self {
            applied: 0,
            rejected: 0,
            revised: 0,
            consistency: ConsistencyReport {
                score: 100,
                consistent: true,
                recommendations: Vec::new(),
            },
            results: Vec::new(),
            errors,
            review: ReviewCounts::default(),
            review_stats,
        }
    }
}

/// Sequences generator, gate, revision loop, and applier over one batch.
///
/// Per issue: pending -> proposed -> rejected | approved | needs-revision,
/// needs-revision gets exactly one revise + re-review, and approved fixes
/// end as fixed or failed through the applier. The orchestrator itself never
/// mutates target resources.
pub struct Pipeline {
    issues: Arc<dyn IssueStore>,
    generator: FixGenerator,
    gate: QualityGate,
    applier: FixApplier,
    settings: Settings,
}

impl Pipeline {
    pub fn new(
        issues: Arc<dyn IssueStore>,
        generator: FixGenerator,
        gate: QualityGate,
        applier: FixApplier,
        settings: Settings,
    ) -> Self {
        Self {
            issues,
            generator,
            gate,
            applier,
            settings,
        }
    }

    /// Run the pipeline over a batch of issue ids
    pub async fn run(&self, issue_ids: &[u64]) -> RunReport {
        let mut errors = Vec::new();

        let batch = if issue_ids.len() > self.settings.max_fixes_per_run {
            tracing::warn!(
                "batch of {} capped to {} issues",
                issue_ids.len(),
                self.settings.max_fixes_per_run
            );
            errors.push(format!(
                "batch capped at {} issues; {} deferred",
                self.settings.max_fixes_per_run,
                issue_ids.len() - self.settings.max_fixes_per_run
            ));
            &issue_ids[..self.settings.max_fixes_per_run]
        } else {
            issue_ids
        };

        // Step 1: generate a proposed fix for every issue in the batch
        let mut pending = Vec::new();
        for &issue_id in batch {
            let issue = match self.issues.get(issue_id) {
                Ok(Some(issue)) => issue,
                Ok(None) => {
                    errors.push(format!("issue {}: not found", issue_id));
                    continue;
                }
                Err(err) => {
                    errors.push(format!("issue {}: {}", issue_id, err));
                    continue;
                }
            };
            if !issue.auto_fixable {
                errors.push(format!("issue {}: not auto-fixable", issue_id));
                continue;
            }
            match self.generator.generate(&issue).await {
                Ok(fix) => pending.push(PendingFix { issue, fix }),
                Err(err) => errors.push(format!("issue {}: {}", issue_id, err)),
            }
        }

        if pending.is_empty() {
            errors.push("no valid fixes to process".to_string());
            return RunReport::empty(errors, self.gate.stats());
        }

        // Step 2: batch review
        let mut outcome = self.gate.review_all(&pending).await;
        let revised = outcome.needs_revision.len();

        // Step 3: one revision pass per needs-revision fix, then one
        // re-review; anything still below the bar is dropped
        let threshold = self.gate.threshold();
        for candidate in std::mem::take(&mut outcome.needs_revision) {
            let improved = match self
                .generator
                .revise(&candidate.pending.fix, &candidate.verdict.improvements)
                .await
            {
                Ok(fix) => fix,
                Err(err) => {
                    errors.push(format!(
                        "issue {}: revision failed: {}",
                        candidate.pending.issue.id, err
                    ));
                    continue;
                }
            };

            let re_verdict = self.gate.review_fix(&candidate.pending.issue, &improved).await;
            if disposition(&re_verdict, threshold) == Disposition::Approved {
                outcome.approved.push(PendingFix {
                    issue: candidate.pending.issue,
                    fix: improved,
                });
            } else {
                tracing::debug!(
                    "issue {} dropped after revision (score {})",
                    candidate.pending.issue.id,
                    re_verdict.score
                );
            }
        }

        // Step 4: consistency check always sees the final approved set
        let consistency = self.gate.ensure_consistency(&outcome.approved).await;

        // Step 5: apply approved fixes strictly in order
        let mut results = Vec::new();
        for pending in &outcome.approved {
            match self.applier.apply(&pending.issue, &pending.fix) {
                Ok(result) => results.push(result),
                Err(err) => {
                    errors.push(format!("issue {}: apply failed: {}", pending.issue.id, err))
                }
            }
        }

        RunReport {
            applied: outcome.approved.len(),
            rejected: outcome.rejected.len(),
            revised,
            consistency,
            results,
            errors,
            review: outcome.counts,
            review_stats: self.gate.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, IssueKind, IssueStatus, ResourceField, ResourceRef};
    use crate::profile::SiteProfile;
    use crate::store::{MemoryStore, RecordStore, ResourceStore};
    use crate::testutil::ScriptedGateway;

    fn pipeline_with(
        gateway: Arc<ScriptedGateway>,
        store: Arc<MemoryStore>,
        settings: Settings,
    ) -> Pipeline {
        let generator = FixGenerator::new(
            gateway.clone(),
            store.clone(),
            store.clone(),
            settings.clone(),
        );
        let gate = QualityGate::new(gateway.clone(), store.clone(), settings.clone());
        let applier = FixApplier::new(store.clone(), store.clone(), store.clone());
        Pipeline::new(store, generator, gate, applier, settings)
    }

    fn seed_title_issue(store: &MemoryStore, id: u64) {
        store.insert_resource(id, format!("Post {}", id));
        store.set_field(id, ResourceField::TitleTag, "Existing Title");
        store.insert_issue(Issue::new(
            id,
            IssueKind::MissingTitleTag,
            ResourceRef::post(id),
            "No title tag",
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits_without_gateway_calls() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        let pipeline = pipeline_with(gateway.clone(), store, Settings::default());

        let report = pipeline.run(&[]).await;
        assert_eq!(report.applied, 0);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.revised, 0);
        assert!(report.errors.iter().any(|e| e.contains("no valid fixes")));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_issue_ids_short_circuit() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        let pipeline = pipeline_with(gateway.clone(), store, Settings::default());

        let report = pipeline.run(&[7, 8]).await;
        assert_eq!(report.applied, 0);
        assert_eq!(report.errors.len(), 3); // two not-found plus nothing-to-process
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_three_issue_scenario_with_revision() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        for id in 1..=3 {
            seed_title_issue(&store, id);
        }

        // Generation, in batch order
        gateway.push_ok("Fresh Title One");
        gateway.push_ok("Fresh Title Two");
        gateway.push_ok("Fresh Title Three");
        // Review: approve outright / revise / reject
        gateway.push_ok(r#"{"decision":"approve","score":90,"reasoning":"good"}"#);
        gateway.push_ok(
            r#"{"decision":"revise","score":60,"reasoning":"weak","improvements":["tighten"]}"#,
        );
        gateway.push_ok(r#"{"decision":"reject","score":30,"reasoning":"off-brand"}"#);
        // Revision of issue 2, then its re-review
        gateway.push_ok("Fresh Title Two, Tightened");
        gateway.push_ok(r#"{"decision":"approve","score":85,"reasoning":"better"}"#);
        // Consistency over the two approved fixes
        gateway.push_ok(r#"{"score":95,"consistent":true,"recommendations":[]}"#);

        let pipeline = pipeline_with(gateway.clone(), store.clone(), Settings::default());
        let report = pipeline.run(&[1, 2, 3]).await;

        assert_eq!(report.applied, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.revised, 1);
        assert_eq!(report.consistency.score, 95);
        assert_eq!(report.review.total, 3);
        assert!(report.results.iter().all(|r| r.success));

        // Approved fixes landed; the rejected issue stays pending
        assert_eq!(
            store.field(1, ResourceField::TitleTag),
            Some("Fresh Title One".to_string())
        );
        assert_eq!(
            store.field(2, ResourceField::TitleTag),
            Some("Fresh Title Two, Tightened".to_string())
        );
        assert_eq!(
            store.field(3, ResourceField::TitleTag),
            Some("Existing Title".to_string())
        );
        let rejected_issue = crate::store::IssueStore::get(&*store, 3).unwrap().unwrap();
        assert_eq!(rejected_issue.status, IssueStatus::Pending);
    }

    #[tokio::test]
    async fn test_revision_failing_re_review_is_dropped() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        seed_title_issue(&store, 1);

        gateway.push_ok("Fresh Title");
        gateway.push_ok(
            r#"{"decision":"revise","score":60,"reasoning":"weak","improvements":["tighten"]}"#,
        );
        gateway.push_ok("Still Weak Title");
        // Re-review stays below threshold: dropped, no further attempts
        gateway.push_ok(r#"{"decision":"approve","score":75,"reasoning":"still weak"}"#);

        let pipeline = pipeline_with(gateway.clone(), store.clone(), Settings::default());
        let report = pipeline.run(&[1]).await;

        assert_eq!(report.applied, 0);
        assert_eq!(report.revised, 1);
        // Generation + review + revision + re-review, and nothing more:
        // the empty approved set makes the consistency check trivial
        assert_eq!(gateway.call_count(), 4);
        assert_eq!(
            store.field(1, ResourceField::TitleTag),
            Some("Existing Title".to_string())
        );
    }

    #[tokio::test]
    async fn test_generation_failure_excludes_issue_without_aborting() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        seed_title_issue(&store, 1);
        seed_title_issue(&store, 2);

        gateway.push_ok("Fresh Title One");
        gateway.push_err(crate::gateway::GatewayError::Timeout(45));
        gateway.push_ok(r#"{"decision":"approve","score":90,"reasoning":"good"}"#);
        gateway.push_ok(r#"{"score":100,"consistent":true,"recommendations":[]}"#);

        let pipeline = pipeline_with(gateway.clone(), store, Settings::default());
        let report = pipeline.run(&[1, 2]).await;

        assert_eq!(report.applied, 1);
        assert_eq!(report.review.total, 1);
        assert!(report.errors.iter().any(|e| e.contains("timed out")));
    }

    #[tokio::test]
    async fn test_unsupported_issue_excluded_from_review() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        seed_title_issue(&store, 1);
        store.insert_resource(2, "Post 2");
        store.insert_issue(Issue::new(
            2,
            IssueKind::BrokenInternalLink,
            ResourceRef::post(2),
            "Broken link",
        ));

        gateway.push_ok("Fresh Title");
        gateway.push_ok(r#"{"decision":"approve","score":90,"reasoning":"good"}"#);
        gateway.push_ok(r#"{"score":100,"consistent":true,"recommendations":[]}"#);

        let pipeline = pipeline_with(gateway.clone(), store, Settings::default());
        let report = pipeline.run(&[1, 2]).await;

        assert_eq!(report.review.total, 1);
        assert_eq!(report.applied, 1);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("no generation strategy")));
    }

    #[tokio::test]
    async fn test_batch_cap_defers_excess_issues() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        for id in 1..=3 {
            seed_title_issue(&store, id);
        }

        gateway.push_ok("Fresh Title One");
        gateway.push_ok(r#"{"decision":"approve","score":90,"reasoning":"good"}"#);
        gateway.push_ok(r#"{"score":100,"consistent":true,"recommendations":[]}"#);

        let mut settings = Settings::default();
        settings.max_fixes_per_run = 1;
        let pipeline = pipeline_with(gateway.clone(), store, settings);
        let report = pipeline.run(&[1, 2, 3]).await;

        assert_eq!(report.applied, 1);
        assert!(report.errors.iter().any(|e| e.contains("2 deferred")));
    }

    /// Delegates to a MemoryStore but refuses writes to one post
    struct ReadOnlyPost {
        inner: Arc<MemoryStore>,
        locked_post: u64,
    }

    impl ResourceStore for ReadOnlyPost {
        fn read_field(
            &self,
            target: &ResourceRef,
            field: ResourceField,
        ) -> anyhow::Result<Option<String>> {
            self.inner.read_field(target, field)
        }

        fn write_field(
            &self,
            target: &ResourceRef,
            field: ResourceField,
            value: &str,
        ) -> anyhow::Result<()> {
            if target.post_id == self.locked_post {
                anyhow::bail!("post {} is locked", self.locked_post);
            }
            self.inner.write_field(target, field, value)
        }

        fn title(&self, target: &ResourceRef) -> anyhow::Result<Option<String>> {
            self.inner.title(target)
        }
    }

    #[tokio::test]
    async fn test_apply_failure_does_not_abort_batch() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::new());
        store.set_profile(SiteProfile::default());
        seed_title_issue(&store, 1);
        seed_title_issue(&store, 2);
        let resources = Arc::new(ReadOnlyPost {
            inner: store.clone(),
            locked_post: 1,
        });

        gateway.push_ok("Fresh Title One");
        gateway.push_ok("Fresh Title Two");
        gateway.push_ok(r#"{"decision":"approve","score":90,"reasoning":"good"}"#);
        gateway.push_ok(r#"{"decision":"approve","score":90,"reasoning":"good"}"#);
        gateway.push_ok(r#"{"score":100,"consistent":true,"recommendations":[]}"#);

        let settings = Settings::default();
        let generator = FixGenerator::new(
            gateway.clone(),
            resources.clone(),
            store.clone(),
            settings.clone(),
        );
        let gate = QualityGate::new(gateway.clone(), store.clone(), settings.clone());
        let applier = FixApplier::new(store.clone(), store.clone(), resources);
        let pipeline = Pipeline::new(store.clone(), generator, gate, applier, settings);

        let report = pipeline.run(&[1, 2]).await;

        // The locked post's fix fails but the second one still lands
        assert_eq!(report.results.len(), 2);
        assert!(!report.results[0].success);
        assert!(report.results[1].success);
        assert_eq!(
            store.field(2, ResourceField::TitleTag),
            Some("Fresh Title Two".to_string())
        );

        let failed_issue = crate::store::IssueStore::get(&*store, 1).unwrap().unwrap();
        assert_eq!(failed_issue.status, IssueStatus::Failed);
        let fixed_issue = crate::store::IssueStore::get(&*store, 2).unwrap().unwrap();
        assert_eq!(fixed_issue.status, IssueStatus::Fixed);

        // Both attempts are in the audit log
        let records = store.all().unwrap();
        assert_eq!(records.len(), 2);
    }
}
