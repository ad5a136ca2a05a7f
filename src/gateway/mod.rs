//! Content generation gateway
//!
//! The single external capability the pipeline depends on: hand it a typed
//! request, get text back or a typed failure. The fix generator uses the
//! free-form mode; the quality gate uses the persona + structured-JSON mode.

pub mod openrouter;

pub use openrouter::OpenRouterGateway;

use async_trait::async_trait;

/// One generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Optional persona installed as the system message
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    /// Ask the upstream for a JSON object response
    pub json_expected: bool,
}

impl GenerationRequest {
    /// Free-form content mode, used by the fix generator
    pub fn freeform(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens,
            json_expected: false,
        }
    }

    /// Persona + structured-JSON mode, used by the quality gate
    pub fn judgment(system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: Some(system.into()),
            prompt: prompt.into(),
            max_tokens,
            json_expected: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No API credential configured
    #[error("no API credential configured")]
    NoCredential,

    /// Upstream request or service failure
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Call exceeded the configured timeout
    #[error("generation timed out after {0}s")]
    Timeout(u64),

    /// Upstream answered, but the payload was unusable
    #[error("malformed gateway output: {0}")]
    MalformedOutput(String),
}

/// External content generation capability
///
/// Non-deterministic; may be slow, fail, or return malformed output. Every
/// caller in the pipeline treats failures as recoverable at the granularity
/// of one fix.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GatewayError>;
}
