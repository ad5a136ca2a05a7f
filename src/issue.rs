//! Issues and the closed set of fixable kinds.
//!
//! Every detected problem is typed by [`IssueKind`]. The kind carries its own
//! capabilities (serialized name, mutation target, whether generation is
//! supported), so adding a kind forces every dispatch site to handle it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of detected issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingMetaDescription,
    ThinContent,
    MissingAltText,
    MissingTitleTag,
    MissingSchema,
    MissingH1,
    DuplicateTitle,
    BrokenInternalLink,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingMetaDescription => "missing_meta_description",
            IssueKind::ThinContent => "thin_content",
            IssueKind::MissingAltText => "missing_alt_text",
            IssueKind::MissingTitleTag => "missing_title_tag",
            IssueKind::MissingSchema => "missing_schema",
            IssueKind::MissingH1 => "missing_h1",
            IssueKind::DuplicateTitle => "duplicate_title",
            IssueKind::BrokenInternalLink => "broken_internal_link",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "missing_meta_description" => Some(IssueKind::MissingMetaDescription),
            "thin_content" => Some(IssueKind::ThinContent),
            "missing_alt_text" => Some(IssueKind::MissingAltText),
            "missing_title_tag" => Some(IssueKind::MissingTitleTag),
            "missing_schema" => Some(IssueKind::MissingSchema),
            "missing_h1" => Some(IssueKind::MissingH1),
            "duplicate_title" => Some(IssueKind::DuplicateTitle),
            "broken_internal_link" => Some(IssueKind::BrokenInternalLink),
            _ => None,
        }
    }

    /// The resource field a fix for this kind is written to.
    ///
    /// `None` means there is no apply logic for the kind; the applier
    /// records `no_apply_logic` without mutating anything.
    pub fn field(&self) -> Option<ResourceField> {
        match self {
            IssueKind::MissingMetaDescription => Some(ResourceField::MetaDescription),
            IssueKind::ThinContent => Some(ResourceField::Body),
            IssueKind::MissingAltText => Some(ResourceField::AltText),
            IssueKind::MissingTitleTag | IssueKind::DuplicateTitle => {
                Some(ResourceField::TitleTag)
            }
            IssueKind::MissingSchema => Some(ResourceField::SchemaMarkup),
            IssueKind::MissingH1 => Some(ResourceField::H1),
            IssueKind::BrokenInternalLink => None,
        }
    }

    /// Whether the fix generator has a strategy for this kind.
    pub fn supports_generation(&self) -> bool {
        !matches!(self, IssueKind::BrokenInternalLink)
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field of a target resource that a fix mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceField {
    MetaDescription,
    Body,
    AltText,
    TitleTag,
    SchemaMarkup,
    H1,
}

/// Issue severity as reported by detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Lifecycle status of an issue
///
/// Transitions to `Fixed` or `Failed` happen exclusively through the applier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Pending,
    Fixed,
    Ignored,
    Failed,
}

/// Reference to the resource an issue targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Content item the issue was detected on
    pub post_id: u64,
    /// Secondary locator, e.g. the image URL for alt-text issues
    pub url: Option<String>,
}

impl ResourceRef {
    pub fn post(post_id: u64) -> Self {
        Self { post_id, url: None }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "post {} ({})", self.post_id, url),
            None => write!(f, "post {}", self.post_id),
        }
    }
}

/// A detected problem awaiting remediation
///
/// Created by detection (external); this pipeline only consumes issues and
/// moves them through their lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub kind: IssueKind,
    pub severity: Severity,
    pub target: ResourceRef,
    pub description: String,
    pub auto_fixable: bool,
    pub status: IssueStatus,
    /// Priority score assigned by detection; higher means more urgent
    pub priority: u32,
}

impl Issue {
    pub fn new(id: u64, kind: IssueKind, target: ResourceRef, description: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            severity: Severity::Warning,
            target,
            description: description.into(),
            auto_fixable: true,
            status: IssueStatus::Pending,
            priority: 0,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_auto_fixable(mut self, auto_fixable: bool) -> Self {
        self.auto_fixable = auto_fixable;
        self
    }
}
