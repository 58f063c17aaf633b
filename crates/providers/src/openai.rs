use async_trait::async_trait;
use reqwest::Client;
use sentoogle_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::client::{build_http_client, truncate_at_char_boundary};
use crate::Provider;

/// Completion provider for any OpenAI-compatible `/chat/completions` API
/// (Fireworks serves the local model tiers this way).
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new_with_proxy(api_key: &str, api_base: &str, model: &str, proxy: Option<&str>) -> Self {
        let resolved_base = api_base.trim_end_matches('/').to_string();
        let client = build_http_client(proxy, &resolved_base, Duration::from_secs(120));
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: resolved_base,
            model: model.to_string(),
            temperature: 0.7,
        }
    }

    fn extract_text(raw_body: &str) -> Result<String> {
        let chat_response: ChatResponse = serde_json::from_str(raw_body).map_err(|e| {
            let end = truncate_at_char_boundary(raw_body, 500);
            Error::Provider(format!("Failed to parse response: {}. Body: {}", e, &raw_body[..end]))
        })?;
        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("No choices in response".to_string()))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "no API key configured for {}",
                self.api_base
            )));
        }

        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: self.temperature,
        };

        info!(url = %url, model = %self.model, prompt_len = prompt.len(), "Calling LLM");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "LLM API error");
            return Err(Error::Provider(format!("API error {}: {}", status, raw_body)));
        }

        {
            let end = truncate_at_char_boundary(&raw_body, 500);
            debug!(body_len = raw_body.len(), preview = %&raw_body[..end], "LLM raw response");
        }

        Self::extract_text(&raw_body)
    }
}
