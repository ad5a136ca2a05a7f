//! Quality gate
//!
//! An automated second opinion with access to the site's voice context. Every
//! proposed fix passes through here before it can be applied; there is no
//! bypass path. Reviewer outages degrade according to the configured
//! [`ReviewFailurePolicy`] instead of blocking the pipeline.

use crate::config::{ReviewFailurePolicy, Settings};
use crate::gateway::{GenerationGateway, GenerationRequest};
use crate::generate::ProposedFix;
use crate::issue::{Issue, IssueKind};
use crate::parse::{parse_json_lenient, truncate_content};
use crate::profile::ProfileProvider;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Upper bound on fixes included in one consistency judgment request
const CONSISTENCY_SAMPLE: usize = 10;

/// Score attached to default verdicts (absent profile, fail-open fallback)
const DEFAULT_VERDICT_SCORE: u8 = 70;

/// Reviewer decision for one fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Revise,
    Reject,
}

/// Outcome of reviewing one proposed fix
#[derive(Debug, Clone, Serialize)]
pub struct ReviewVerdict {
    pub decision: Decision,
    /// 0-100
    pub score: u8,
    pub reasoning: String,
    pub improvements: Vec<String>,
    pub risks: Vec<String>,
}

impl ReviewVerdict {
    fn default_approval(reasoning: &str) -> Self {
        Self {
            decision: Decision::Approve,
            score: DEFAULT_VERDICT_SCORE,
            reasoning: reasoning.to_string(),
            improvements: Vec::new(),
            risks: Vec::new(),
        }
    }

    fn rejected(reasoning: &str) -> Self {
        Self {
            decision: Decision::Reject,
            score: 0,
            reasoning: reasoning.to_string(),
            improvements: Vec::new(),
            risks: Vec::new(),
        }
    }
}

/// Where a reviewed fix lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Approved,
    NeedsRevision,
    Rejected,
}

/// Decision policy for a verdict against the quality threshold.
///
/// Approve at or above threshold is approved; revise, or approve below
/// threshold, needs revision; everything else is rejected.
pub fn disposition(verdict: &ReviewVerdict, threshold: u8) -> Disposition {
    match verdict.decision {
        Decision::Approve if verdict.score >= threshold => Disposition::Approved,
        Decision::Approve | Decision::Revise => Disposition::NeedsRevision,
        Decision::Reject => Disposition::Rejected,
    }
}

/// An issue paired with its proposed fix, flowing through review
#[derive(Debug, Clone)]
pub struct PendingFix {
    pub issue: Issue,
    pub fix: ProposedFix,
}

/// A fix the reviewer wants improved before publication
#[derive(Debug, Clone)]
pub struct RevisionCandidate {
    pub pending: PendingFix,
    pub verdict: ReviewVerdict,
}

/// A fix the reviewer refused
#[derive(Debug, Clone)]
pub struct RejectedFix {
    pub pending: PendingFix,
    pub verdict: ReviewVerdict,
}

/// Count summary of one batch review
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewCounts {
    pub total: usize,
    pub approved: usize,
    pub needs_revision: usize,
    pub rejected: usize,
}

/// Partitioned result of a batch review; every input lands in exactly one
/// partition.
#[derive(Debug, Default)]
pub struct ReviewOutcome {
    pub approved: Vec<PendingFix>,
    pub needs_revision: Vec<RevisionCandidate>,
    pub rejected: Vec<RejectedFix>,
    pub counts: ReviewCounts,
}

/// Advisory result of the batch consistency check
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub score: u8,
    pub consistent: bool,
    pub recommendations: Vec<String>,
}

impl ConsistencyReport {
    fn trivial() -> Self {
        Self {
            score: 100,
            consistent: true,
            recommendations: Vec::new(),
        }
    }
}

/// Running statistics over every verdict this gate has produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewStats {
    pub total_reviews: u64,
    pub approved: u64,
    pub rejected: u64,
    pub revised: u64,
    pub avg_score: f64,
}

impl ReviewStats {
    fn record(&mut self, verdict: &ReviewVerdict) {
        self.total_reviews += 1;
        match verdict.decision {
            Decision::Approve => self.approved += 1,
            Decision::Reject => self.rejected += 1,
            Decision::Revise => self.revised += 1,
        }
        let n = self.total_reviews as f64;
        self.avg_score = (self.avg_score * (n - 1.0) + verdict.score as f64) / n;
    }
}

/// Raw verdict shape as returned by the reviewer persona
#[derive(Deserialize)]
struct VerdictJson {
    #[serde(default)]
    decision: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
}

impl VerdictJson {
    /// Any decision value other than approve/revise maps to reject.
    fn into_verdict(self) -> ReviewVerdict {
        let decision = match self.decision.as_str() {
            "approve" => Decision::Approve,
            "revise" => Decision::Revise,
            _ => Decision::Reject,
        };
        ReviewVerdict {
            decision,
            score: self.score.clamp(0, 100) as u8,
            reasoning: self.reasoning,
            improvements: self.improvements,
            risks: self.risks,
        }
    }
}

#[derive(Deserialize)]
struct ConsistencyJson {
    #[serde(default)]
    score: i64,
    #[serde(default = "default_true")]
    consistent: bool,
    #[serde(default)]
    recommendations: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// The automated reviewer
pub struct QualityGate {
    gateway: Arc<dyn GenerationGateway>,
    profiles: Arc<dyn ProfileProvider>,
    settings: Settings,
    stats: Mutex<ReviewStats>,
}

impl QualityGate {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        profiles: Arc<dyn ProfileProvider>,
        settings: Settings,
    ) -> Self {
        Self {
            gateway,
            profiles,
            settings,
            stats: Mutex::new(ReviewStats::default()),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.settings.quality_threshold
    }

    pub fn stats(&self) -> ReviewStats {
        self.stats.lock().unwrap().clone()
    }

    /// Review a single proposed fix.
    ///
    /// Without a site profile this returns a default approval at score 70, an
    /// explicit policy choice so fixes are not blocked before brand context
    /// has been built. Reviewer outages and unparsable verdicts follow the
    /// configured failure policy.
    pub async fn review_fix(&self, issue: &Issue, fix: &ProposedFix) -> ReviewVerdict {
        let verdict = self.review_fix_inner(issue, fix).await;
        self.stats.lock().unwrap().record(&verdict);
        verdict
    }

    async fn review_fix_inner(&self, issue: &Issue, fix: &ProposedFix) -> ReviewVerdict {
        let format_errors = validate_fix_format(issue.kind, fix);
        if !format_errors.is_empty() {
            return ReviewVerdict {
                decision: Decision::Revise,
                score: 50,
                reasoning: "failed format validation".to_string(),
                improvements: format_errors,
                risks: Vec::new(),
            };
        }

        let profile = match self.profiles.profile() {
            Some(profile) => profile,
            None => {
                return ReviewVerdict::default_approval(
                    "no site profile available, using default approval",
                )
            }
        };

        let prompt = prompts::review_prompt(&profile, issue, &fix.as_prompt_text());
        let request = GenerationRequest::judgment(prompts::REVIEWER_SYSTEM, prompt, 2000);

        let response = match self.gateway.generate(&request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("fix review failed: {}", err);
                return self.failure_verdict();
            }
        };

        match parse_json_lenient::<VerdictJson>(&response, "fix review") {
            Ok(raw) => raw.into_verdict(),
            Err(err) => {
                tracing::warn!("unparsable review verdict: {}", err);
                self.failure_verdict()
            }
        }
    }

    fn failure_verdict(&self) -> ReviewVerdict {
        match self.settings.review_failure_policy {
            ReviewFailurePolicy::FailOpen => {
                ReviewVerdict::default_approval("review failed, defaulting to approval")
            }
            ReviewFailurePolicy::FailClosed => {
                ReviewVerdict::rejected("review failed and policy is fail-closed")
            }
        }
    }

    /// Review a batch of fixes in order, partitioning each into exactly one
    /// of approved, needs-revision, or rejected.
    pub async fn review_all(&self, fixes: &[PendingFix]) -> ReviewOutcome {
        let mut outcome = ReviewOutcome::default();
        let threshold = self.threshold();

        for pending in fixes {
            let verdict = self.review_fix(&pending.issue, &pending.fix).await;
            match disposition(&verdict, threshold) {
                Disposition::Approved => outcome.approved.push(pending.clone()),
                Disposition::NeedsRevision => outcome.needs_revision.push(RevisionCandidate {
                    pending: pending.clone(),
                    verdict,
                }),
                Disposition::Rejected => outcome.rejected.push(RejectedFix {
                    pending: pending.clone(),
                    verdict,
                }),
            }
        }

        outcome.counts = ReviewCounts {
            total: fixes.len(),
            approved: outcome.approved.len(),
            needs_revision: outcome.needs_revision.len(),
            rejected: outcome.rejected.len(),
        };
        outcome
    }

    /// Check tone and pattern consistency across the approved set.
    ///
    /// Advisory only: with no profile, an empty set, or any failure, the
    /// trivial passing report is returned.
    pub async fn ensure_consistency(&self, approved: &[PendingFix]) -> ConsistencyReport {
        let profile = match self.profiles.profile() {
            Some(profile) if !approved.is_empty() => profile,
            _ => return ConsistencyReport::trivial(),
        };

        let sample: Vec<serde_json::Value> = approved
            .iter()
            .take(CONSISTENCY_SAMPLE)
            .map(|pending| {
                serde_json::json!({
                    "issue_type": pending.issue.kind.as_str(),
                    "fix": truncate_content(&pending.fix.as_prompt_text(), 400),
                })
            })
            .collect();
        let sample_json = serde_json::to_string_pretty(&sample).unwrap_or_default();

        let prompt = prompts::consistency_prompt(&profile, &sample_json);
        let request = GenerationRequest::judgment(prompts::CONSISTENCY_SYSTEM, prompt, 2500);

        let response = match self.gateway.generate(&request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!("consistency check failed: {}", err);
                return ConsistencyReport::trivial();
            }
        };

        match parse_json_lenient::<ConsistencyJson>(&response, "consistency check") {
            Ok(raw) => ConsistencyReport {
                score: raw.score.clamp(0, 100) as u8,
                consistent: raw.consistent,
                recommendations: raw.recommendations,
            },
            Err(err) => {
                tracing::warn!("unparsable consistency report: {}", err);
                ConsistencyReport::trivial()
            }
        }
    }
}

/// Deterministic format checks applied before spending a review call.
///
/// Returns the list of violations; an empty list means the fix is
/// well-formed for its kind.
pub fn validate_fix_format(kind: IssueKind, fix: &ProposedFix) -> Vec<String> {
    let text = match fix {
        ProposedFix::Text(text) => text,
        // Structured fixes are validated by their parser
        ProposedFix::Structured(_) => return Vec::new(),
    };

    let mut errors = Vec::new();
    match kind {
        IssueKind::MissingMetaDescription => {
            if text.is_empty() {
                errors.push("meta description must be a non-empty string".to_string());
            } else {
                let length = text.chars().count();
                if !(120..=160).contains(&length) {
                    errors.push(format!(
                        "meta description length ({}) should be between 120-160 characters",
                        length
                    ));
                }
            }
        }
        IssueKind::MissingAltText => {
            if text.is_empty() {
                errors.push("alt text must be a non-empty string".to_string());
            } else {
                let word_count = text.split_whitespace().count();
                if !(5..=20).contains(&word_count) {
                    errors.push(format!(
                        "alt text word count ({}) should be between 5-20 words",
                        word_count
                    ));
                }
            }
        }
        IssueKind::ThinContent => {
            if text.trim().is_empty() {
                errors.push("expanded content must be non-empty".to_string());
            }
        }
        _ => {}
    }
    errors
}
