//! Fix generation
//!
//! Translates an issue into a generation request and invokes the gateway.
//! Dispatch is exhaustive over [`IssueKind`]; unsupported kinds fail fast
//! without an external call. The generator never inspects content quality,
//! that is the quality gate's job.

use crate::config::Settings;
use crate::error::FixError;
use crate::gateway::{GenerationGateway, GenerationRequest};
use crate::issue::{Issue, IssueKind, ResourceField};
use crate::parse::truncate_content;
use crate::profile::{ProfileProvider, SiteProfile};
use crate::prompts;
use crate::store::ResourceStore;
use serde::Serialize;
use std::sync::Arc;

const EXCERPT_CHARS: usize = 600;

/// A fix proposed by the gateway, held only within one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProposedFix {
    Text(String),
    Structured(serde_json::Value),
}

impl ProposedFix {
    /// Render for prompts (review, revision)
    pub fn as_prompt_text(&self) -> String {
        match self {
            ProposedFix::Text(text) => text.clone(),
            ProposedFix::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }

    /// Serialize for storage as a record's after-value
    pub fn stored_value(&self) -> String {
        match self {
            ProposedFix::Text(text) => text.clone(),
            ProposedFix::Structured(value) => value.to_string(),
        }
    }
}

/// Issue-to-fix translation, one strategy per issue kind
pub struct FixGenerator {
    gateway: Arc<dyn GenerationGateway>,
    resources: Arc<dyn ResourceStore>,
    profiles: Arc<dyn ProfileProvider>,
    settings: Settings,
}

impl FixGenerator {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        resources: Arc<dyn ResourceStore>,
        profiles: Arc<dyn ProfileProvider>,
        settings: Settings,
    ) -> Self {
        Self {
            gateway,
            resources,
            profiles,
            settings,
        }
    }

    /// Generate a proposed fix for one auto-fixable issue
    pub async fn generate(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        match issue.kind {
            IssueKind::MissingMetaDescription => self.meta_description(issue).await,
            IssueKind::ThinContent => self.expand_thin_content(issue).await,
            IssueKind::MissingAltText => self.alt_text(issue).await,
            IssueKind::MissingTitleTag => self.title_tag(issue).await,
            IssueKind::MissingSchema => self.schema_markup(issue).await,
            IssueKind::MissingH1 => self.h1(issue),
            IssueKind::DuplicateTitle => self.unique_title(issue).await,
            IssueKind::BrokenInternalLink => Err(FixError::UnsupportedIssueType(issue.kind)),
        }
    }

    /// Produce an improved version of a fix from reviewer feedback.
    ///
    /// With no improvement suggestions there is nothing actionable, so the
    /// original fix is returned unchanged.
    pub async fn revise(
        &self,
        original: &ProposedFix,
        improvements: &[String],
    ) -> Result<ProposedFix, FixError> {
        if improvements.is_empty() {
            return Ok(original.clone());
        }

        let prompt = prompts::revise_prompt(&original.as_prompt_text(), improvements);
        let response = self
            .gateway
            .generate(&GenerationRequest::freeform(prompt, 1000))
            .await?;
        let revised = response.trim().to_string();

        // A structured original stays structured when the revision still
        // parses; otherwise fall back to text and let review judge it.
        if let ProposedFix::Structured(_) = original {
            if let Ok(value) = crate::parse::parse_json_lenient(&revised, "revised fix") {
                return Ok(ProposedFix::Structured(value));
            }
        }
        Ok(ProposedFix::Text(revised))
    }

    async fn meta_description(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        let profile = self.require_profile()?;
        let title = self.require_title(issue)?;
        let excerpt = self.body_excerpt(issue)?;
        let prompt = prompts::meta_description_prompt(&profile, &title, &excerpt);
        self.freeform(prompt, 300).await
    }

    async fn expand_thin_content(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        let profile = self.require_profile()?;
        let title = self.require_title(issue)?;
        let body = self
            .resources
            .read_field(&issue.target, ResourceField::Body)?
            .unwrap_or_default();
        let prompt = prompts::expand_content_prompt(
            &profile,
            &title,
            &body,
            self.settings.target_word_count,
        );
        self.freeform(prompt, 4000).await
    }

    async fn alt_text(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        let profile = self.require_profile()?;
        let title = self.require_title(issue)?;
        let image_url = issue.target.url.as_deref().unwrap_or_default();
        let prompt = prompts::alt_text_prompt(&profile, image_url, &title);
        self.freeform(prompt, 200).await
    }

    async fn title_tag(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        let profile = self.require_profile()?;
        let title = self.require_title(issue)?;
        let excerpt = self.body_excerpt(issue)?;
        let prompt = prompts::title_tag_prompt(&profile, &title, &excerpt);
        self.freeform(prompt, 200).await
    }

    async fn schema_markup(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        let title = self.require_title(issue)?;
        let excerpt = self.body_excerpt(issue)?;
        let prompt = prompts::schema_markup_prompt(&title, &excerpt);

        let mut request = GenerationRequest::freeform(prompt, 1000);
        request.json_expected = true;
        let response = self.gateway.generate(&request).await?;

        let value: serde_json::Value = crate::parse::parse_json_lenient(&response, "schema markup")
            .map_err(|e| {
                FixError::Gateway(crate::gateway::GatewayError::MalformedOutput(e.to_string()))
            })?;
        Ok(ProposedFix::Structured(value))
    }

    /// The resource title is the H1; no gateway call needed
    fn h1(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        let title = self.require_title(issue)?;
        Ok(ProposedFix::Text(title))
    }

    async fn unique_title(&self, issue: &Issue) -> Result<ProposedFix, FixError> {
        let title = self.require_title(issue)?;
        let prompt = prompts::unique_title_prompt(&title);
        self.freeform(prompt, 200).await
    }

    async fn freeform(&self, prompt: String, max_tokens: u32) -> Result<ProposedFix, FixError> {
        let response = self
            .gateway
            .generate(&GenerationRequest::freeform(prompt, max_tokens))
            .await?;
        Ok(ProposedFix::Text(response.trim().to_string()))
    }

    fn require_profile(&self) -> Result<SiteProfile, FixError> {
        self.profiles.profile().ok_or(FixError::NoProfile)
    }

    fn require_title(&self, issue: &Issue) -> Result<String, FixError> {
        self.resources
            .title(&issue.target)?
            .ok_or_else(|| FixError::PostNotFound(issue.target.to_string()))
    }

    fn body_excerpt(&self, issue: &Issue) -> Result<String, FixError> {
        let body = self
            .resources
            .read_field(&issue.target, ResourceField::Body)?
            .unwrap_or_default();
        Ok(truncate_content(&body, EXCERPT_CHARS))
    }
}
