//! Model transport via OpenRouter.
//!
//! One chat-completions call per match query, JSON response mode requested.
//! The body content is returned as an opaque string; parsing belongs to the
//! response validator, never the transport.

use crate::error::MatchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Hard request timeout. The original tool relied on the transport default;
/// an explicit bound keeps a hung call from blocking the UI indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Model tiers for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    /// Fast, cheap tier; matching is a ranking task, not generation.
    #[default]
    Fast,
    /// Stronger reasoning for long or ambiguous briefs.
    Quality,
}

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Fast => "google/gemini-2.5-flash",
            Model::Quality => "anthropic/claude-sonnet-4.5",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        4096
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "fast" => Some(Model::Fast),
            "quality" => Some(Model::Quality),
            _ => None,
        }
    }
}

/// Seam between the matcher and the hosted model, so the orchestration is
/// testable with a canned transport.
pub trait BriefClient {
    /// Execute one prompt and return the raw response text.
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl std::future::Future<Output = Result<String, MatchError>> + Send;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
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

/// The real OpenRouter-backed client.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: Model,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: Model) -> Result<Self, MatchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    async fn send(&self, request: &ChatRequest) -> Result<String, MatchError> {
        let mut attempt = 0;
        loop {
            let response = self
                .http
                .post(OPENROUTER_URL)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        transport("the matching call timed out".to_string())
                    } else {
                        transport(format!("request failed: {}", e))
                    }
                })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| transport(format!("failed to read response body: {}", e)))?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    transport(format!("unexpected completion envelope: {}", e))
                })?;
                return parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| transport("completion carried no choices".to_string()));
            }

            // Rate limits get a bounded exponential backoff; everything else
            // is surfaced immediately.
            if status.as_u16() == 429 && attempt < MAX_RETRIES {
                attempt += 1;
                let wait = INITIAL_BACKOFF * 2u32.pow(attempt - 1);
                warn!(attempt, wait_secs = wait.as_secs(), "rate limited, backing off");
                tokio::time::sleep(wait).await;
                continue;
            }

            return Err(match status.as_u16() {
                401 => transport(
                    "invalid API key (run `briefmatch --setup` to update it)".to_string(),
                ),
                429 => transport("rate limited after retries".to_string()),
                500..=599 => transport(format!("service error {}", status)),
                _ => transport(format!(
                    "API error {}: {}",
                    status,
                    crate::response::truncate_str(&text, 200)
                )),
            });
        }
    }
}

impl BriefClient for OpenRouterClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, MatchError> {
        let request = ChatRequest {
            model: self.model.id().to_string(),
            messages: vec![
                Message {
                    role: "system",
                    content: system.to_string(),
                },
                Message {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            max_tokens: self.model.max_tokens(),
            stream: false,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        self.send(&request).await
    }
}

fn transport(message: String) -> MatchError {
    MatchError::Transport { message }
}
