//! OpenRouter-backed generation gateway
//!
//! Blocking request/response per call with a caller-enforced timeout.
//! Rate limits get automatic retry with exponential backoff.

use super::{GatewayError, GenerationGateway, GenerationRequest};
use crate::parse::truncate_str;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_SECS: u64 = 2;
const BACKOFF_MULTIPLIER: u64 = 2;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Gateway implementation against OpenRouter's chat-completions API
pub struct OpenRouterGateway {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenRouterGateway {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl GenerationGateway for OpenRouterGateway {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GatewayError> {
        if self.api_key.is_empty() {
            return Err(GatewayError::NoCredential);
        }

        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(Message {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let response_format = if request.json_expected {
            Some(ResponseFormat {
                format_type: "json_object".to_string(),
            })
        } else {
            None
        };

        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            stream: false,
            response_format,
        };

        let mut retry_count = 0;

        loop {
            let attempt = async {
                let response = self
                    .client
                    .post(OPENROUTER_URL)
                    .header("Content-Type", "application/json")
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&chat_request)
                    .send()
                    .await
                    .map_err(|e| GatewayError::Upstream(format!("request failed: {}", e)))?;

                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|e| GatewayError::Upstream(format!("failed to read response: {}", e)))?;
                Ok::<_, GatewayError>((status, text))
            };

            let (status, text) = match tokio::time::timeout(self.timeout, attempt).await {
                Ok(result) => result?,
                Err(_) => return Err(GatewayError::Timeout(self.timeout.as_secs())),
            };

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    GatewayError::MalformedOutput(format!(
                        "unparsable completion response: {} ({})",
                        e,
                        truncate_str(&text, 200)
                    ))
                })?;

                return parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .ok_or_else(|| {
                        GatewayError::MalformedOutput("completion had no choices".to_string())
                    });
            }

            match status.as_u16() {
                401 | 403 => return Err(GatewayError::NoCredential),
                429 if retry_count < MAX_RETRIES => {
                    retry_count += 1;
                    let backoff = parse_retry_after(&text).unwrap_or_else(|| {
                        INITIAL_BACKOFF_SECS * BACKOFF_MULTIPLIER.pow(retry_count - 1)
                    });
                    tracing::warn!(
                        "rate limited, retrying in {}s (attempt {}/{})",
                        backoff,
                        retry_count,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
                429 => {
                    return Err(GatewayError::Upstream(format!(
                        "rate limited after {} retries",
                        retry_count
                    )))
                }
                _ => {
                    return Err(GatewayError::Upstream(format!(
                        "API error {}: {}",
                        status,
                        truncate_str(&text, 200)
                    )))
                }
            }
        }
    }
}

/// Extract a retry-after hint from a rate-limit response body, if present
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    if let Some(pos) = text_lower.find("retry") {
        let after_retry = &text_lower[pos..];
        for word in after_retry.split_whitespace().skip(1).take(5) {
            if let Ok(secs) = word
                .trim_matches(|c: char| !c.is_numeric())
                .parse::<u64>()
            {
                if secs > 0 && secs < 300 {
                    return Some(secs);
                }
            }
        }
    }
    None
}
