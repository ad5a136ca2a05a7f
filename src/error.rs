//! Error taxonomy for the fix pipeline.
//!
//! Errors scoped to a single issue are contained at that granularity and end
//! up in the run report's error list. Only rollback surfaces errors directly
//! to the caller.

use crate::gateway::GatewayError;
use crate::issue::IssueKind;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum FixError {
    /// Site profile has not been built yet; generation needs brand context.
    #[error("site profile not built yet")]
    NoProfile,

    /// The target resource does not exist.
    #[error("resource {0} not found")]
    PostNotFound(String),

    /// No generation strategy exists for this issue kind.
    #[error("no generation strategy for issue type '{}'", .0.as_str())]
    UnsupportedIssueType(IssueKind),

    /// No mutation target exists for this issue kind.
    #[error("no apply logic for issue type '{}'", .0.as_str())]
    NoApplyLogic(IssueKind),

    /// Fix record missing, or its snapshot is not recoverable.
    #[error("fix record {0} not found or rollback not available")]
    FixNotFound(Uuid),

    /// The issue a fix record points at no longer exists.
    #[error("issue {0} referenced by fix record not found")]
    IssueNotFound(u64),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
