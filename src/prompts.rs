//! Prompt construction for generation, review, and consistency checks.
//!
//! Kept in one place so the contract each prompt promises (output shape,
//! length limits) is easy to audit against the parsers that consume it.

use crate::issue::Issue;
use crate::profile::SiteProfile;

pub(crate) const REVIEWER_SYSTEM: &str = r#"You are a quality control manager for a content agency. You review proposed fixes before they are published to a client site.

Evaluate:
1. Does this fix match the site's brand voice and tone?
2. Is the content quality high enough for publication?
3. Does it serve the target audience appropriately?
4. Are there any red flags or quality issues?
5. Overall assessment

Return JSON:
{
  "decision": "approve/revise/reject",
  "score": 1-100,
  "reasoning": "explanation",
  "improvements": ["suggestion1", "suggestion2"],
  "risks": ["risk1", "risk2"]
}"#;

pub(crate) const CONSISTENCY_SYSTEM: &str = r#"You are reviewing a batch of content fixes for consistency across one website.

Check:
1. Are descriptions consistent in tone?
2. Do alt texts follow a pattern?
3. Is keyword usage natural across content?
4. Any conflicting approaches?

Return JSON:
{
  "score": 1-100,
  "consistent": true/false,
  "recommendations": ["rec1", "rec2"]
}"#;

fn profile_section(profile: &SiteProfile) -> String {
    format!(
        "CLIENT SITE PROFILE:\nNiche: {}\nAudience: {}\nTone: {}\nVoice: {}",
        profile.niche, profile.audience, profile.tone, profile.voice
    )
}

/// User prompt for a single-fix review
pub(crate) fn review_prompt(profile: &SiteProfile, issue: &Issue, fix_text: &str) -> String {
    format!(
        "{}\n\nISSUE:\nType: {}\nTarget: {}\nDescription: {}\n\nPROPOSED FIX:\n{}",
        profile_section(profile),
        issue.kind,
        issue.target,
        issue.description,
        fix_text
    )
}

/// User prompt for the batch consistency check
pub(crate) fn consistency_prompt(profile: &SiteProfile, sample_json: &str) -> String {
    format!(
        "{}\n\nFIXES (sample):\n{}",
        profile_section(profile),
        sample_json
    )
}

/// Prompt asking for an improved version of a fix, given reviewer feedback
pub(crate) fn revise_prompt(original: &str, improvements: &[String]) -> String {
    format!(
        "Improve this content fix based on feedback:\n\nORIGINAL:\n{}\n\nIMPROVEMENTS NEEDED:\n{}\n\nReturn the improved version ONLY, no explanation.",
        original,
        improvements.join("\n")
    )
}

pub(crate) fn meta_description_prompt(profile: &SiteProfile, title: &str, excerpt: &str) -> String {
    format!(
        "{}\n\nWrite a meta description for this page.\n\nTitle: {}\n\nContent excerpt:\n{}\n\nRequirements:\n- 120-160 characters\n- Match the site's tone\n- Compelling, accurate summary of the page\n\nReturn ONLY the meta description, no explanation.",
        profile_section(profile),
        title,
        excerpt
    )
}

pub(crate) fn alt_text_prompt(profile: &SiteProfile, image_url: &str, title: &str) -> String {
    format!(
        "{}\n\nWrite alt text for an image on the page titled '{}'.\n\nImage URL: {}\n\nRequirements:\n- 5-20 words\n- Describe the image in the context of the page\n- No 'image of' or 'picture of' prefix\n\nReturn ONLY the alt text, no explanation.",
        profile_section(profile),
        title,
        image_url
    )
}

pub(crate) fn expand_content_prompt(
    profile: &SiteProfile,
    title: &str,
    body: &str,
    target_word_count: u32,
) -> String {
    format!(
        "{}\n\nExpand this article to approximately {} words by adding:\n- Deeper coverage of the existing points\n- Concrete examples relevant to the audience\n- A clear structure with subheadings\n\nKeep the existing voice and do not pad with filler.\n\nTitle: {}\n\nCurrent content:\n{}\n\nReturn ONLY the expanded article body, no explanation.",
        profile_section(profile),
        target_word_count,
        title,
        body
    )
}

pub(crate) fn title_tag_prompt(profile: &SiteProfile, title: &str, excerpt: &str) -> String {
    format!(
        "{}\n\nWrite a title tag for this page.\n\nPage heading: {}\n\nContent excerpt:\n{}\n\nRequirements:\n- 50-60 characters\n- Match the site's tone\n\nReturn ONLY the title, no explanation.",
        profile_section(profile),
        title,
        excerpt
    )
}

pub(crate) fn schema_markup_prompt(title: &str, excerpt: &str) -> String {
    format!(
        "Generate Article schema markup (JSON-LD) for this page.\n\nTitle: {}\n\nContent excerpt:\n{}\n\nReturn ONLY a JSON object with @context, @type, headline and description fields, no explanation.",
        title, excerpt
    )
}

pub(crate) fn unique_title_prompt(title: &str) -> String {
    format!(
        "Create a unique title variation for: '{}'\n\nKeep the same meaning but make it unique. 50-60 characters.\nReturn ONLY the title, no explanation.",
        title
    )
}
