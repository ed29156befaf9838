//! Oracle trait and the Anthropic transport.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{Error, Result};

/// Text and token count from one oracle call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleReply {
    pub text: String,
    pub output_tokens: u64,
}

/// Opaque LLM transport.
///
/// Implementations must preserve bracketed tags and multi-line content
/// verbatim in the returned text.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn invoke(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
    ) -> Result<OracleReply>;
}

/// Configuration for the Anthropic oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Model id
    pub model: String,
    /// Retry schedule for transient failures
    pub retry: RetryPolicy,
}

impl OracleConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: "claude-sonnet-4-20250514".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Anthropic Messages API client with exponential-backoff retries.
pub struct AnthropicOracle {
    config: OracleConfig,
    http: Client,
}

impl AnthropicOracle {
    const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(config: OracleConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.retry.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn attempt(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
    ) -> Result<OracleReply> {
        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: max_output_tokens,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: user,
            }],
        };

        let url = format!("{}/v1/messages", self.base_url());
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(self.config.retry.timeout_secs * 1000)
                } else {
                    Error::transport("anthropic", format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport("anthropic", format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
                .unwrap_or(body);

            // Rate limits and server-side failures are retryable; everything
            // else (bad request, auth) is not.
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(Error::transport("anthropic", message))
            } else {
                Err(Error::Api {
                    status: status.as_u16(),
                    message,
                })
            };
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| Error::transport("anthropic", format!("Failed to parse response: {}", e)))?;

        let text = parsed
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(OracleReply {
            text,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    async fn invoke(
        &self,
        system: &str,
        user: &str,
        max_output_tokens: u32,
    ) -> Result<OracleReply> {
        let retry = self.config.retry;
        let mut last_message = String::new();

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                let delay = retry.base_delay_secs * 2u64.pow(attempt - 1);
                warn!(attempt, delay_secs = delay, "oracle retry after transient failure");
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            match self.attempt(system, user, max_output_tokens).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_transient() => {
                    last_message = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::retries_exhausted(retry.max_attempts, last_message))
    }
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}
