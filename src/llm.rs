//! Completion endpoint client
//!
//! Single request/response contract with the text completion service:
//! POST `{api_url}/v1/completions` with `{prompt, max_tokens, temperature}`,
//! consume `choices[0].text`. Everything the model says comes back through
//! here as one trimmed string; sanitization happens downstream.

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// All pipeline stages run the model deterministically.
pub const COMPLETION_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

/// Seam between the pipeline and the completion service. Production code
/// uses [`HttpCompletionClient`]; tests substitute a scripted backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_url: String,
}

impl HttpCompletionClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            max_tokens,
            temperature: COMPLETION_TEMPERATURE,
        };

        debug!(max_tokens, prompt_len = prompt.len(), "Calling completion endpoint");

        let response = self
            .client
            .post(format!("{}/v1/completions", self.api_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("completion call failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgentError::Transport(format!(
                "completion endpoint returned status {}",
                response.status()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Transport(format!("invalid completion response: {}", e)))?;

        let text = body
            .choices
            .first()
            .map(|choice| choice.text.trim().to_string())
            .ok_or_else(|| AgentError::Transport("no choices in completion response".to_string()))?;

        debug!(response_len = text.len(), "Completion received");
        Ok(text)
    }
}
