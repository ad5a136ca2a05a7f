//! Site context profile
//!
//! Brand-voice context built by an external profiler. The quality gate and
//! fix generator read it through [`ProfileProvider`]; when no profile exists
//! yet, both fall back to explicit defaults rather than blocking.

use serde::{Deserialize, Serialize};

/// Brand-voice profile for the site under management
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Primary niche, e.g. "home coffee roasting"
    pub niche: String,
    /// Primary audience, e.g. "hobbyist roasters"
    pub audience: String,
    /// Writing tone, e.g. "professional", "casual"
    pub tone: String,
    /// Narrative voice, e.g. "third person"
    pub voice: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            niche: "general".to_string(),
            audience: "general".to_string(),
            tone: "professional".to_string(),
            voice: "third person".to_string(),
        }
    }
}

/// Source of the site profile, absent until the profiler has run
pub trait ProfileProvider: Send + Sync {
    fn profile(&self) -> Option<SiteProfile>;
}
