//! Reasoning backend used by every phase.
//!
//! The pipeline only depends on [`ReasoningClient`]; [`AnthropicClient`] is
//! the production implementation talking to the Anthropic Messages API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::planner::phase::PhaseKind;
use backlog_planner_sdk::log_debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// One request to the reasoning backend
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    /// Phase issuing the request
    pub phase: PhaseKind,
    pub system_prompt: String,
    pub prompt: String,
}

impl ReasoningRequest {
    pub fn new(phase: PhaseKind, system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            phase,
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
        }
    }
}

/// Anything that can answer a phase request with text
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String>;
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    debug: bool,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            debug: false,
        })
    }

    /// Create from `ANTHROPIC_API_KEY`
    pub fn from_env(model: &str) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY not set")?;
        Self::new(api_key, model.to_string())
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ReasoningClient for AnthropicClient {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(request.system_prompt.clone()),
            messages: vec![Message {
                role: "user".into(),
                content: request.prompt.clone(),
            }],
        };

        if self.debug {
            log_debug!(
                "[{}] sending {} chars to {}",
                request.phase,
                request.prompt.len(),
                self.model
            );
        }

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", request.phase))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({status}): {body}");
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        if self.debug {
            log_debug!(
                "[{}] {} in / {} out tokens",
                request.phase,
                reply.usage.input_tokens,
                reply.usage.output_tokens
            );
        }

        Ok(reply.text())
    }
}

// ─── API types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
