//! Client for the remote research agent reached through the ROMA proxy.
//!
//! The protocol is a single POST of `{"topic": <transcript>}` with a bearer
//! credential. Success bodies carry the answer in `final_output`; failures
//! are told apart by HTTP status alone.

use reqwest::{Client, StatusCode};
use sentoogle_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::client::build_http_client;

pub const FORBIDDEN_MESSAGE: &str = "403 Forbidden: Invalid API key or insufficient permissions for the remote agent. Check your agent API key and access rights.";

/// Outcome of a call that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    /// 2xx; the text is the answer to show and record.
    Answer(String),
    /// Non-2xx; the text describes the failure and is shown but never recorded.
    Rejected(String),
}

impl AgentReply {
    pub fn text(&self) -> &str {
        match self {
            AgentReply::Answer(t) | AgentReply::Rejected(t) => t,
        }
    }
}

#[derive(Serialize)]
struct ResearchRequest<'a> {
    topic: &'a str,
}

#[derive(Deserialize)]
struct ResearchResponse {
    #[serde(default)]
    final_output: Option<String>,
}

pub struct RemoteAgentClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RemoteAgentClient {
    pub fn new(endpoint: &str, api_key: &str, proxy: Option<&str>, timeout: Duration) -> Self {
        Self {
            client: build_http_client(proxy, endpoint, timeout),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn research(&self, topic: &str) -> Result<AgentReply> {
        info!(endpoint = %self.endpoint, topic_len = topic.len(), "Calling remote agent");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ResearchRequest { topic })
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Remote agent request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Remote agent returned an error status");
            return Ok(AgentReply::Rejected(status_message(status)));
        }

        let body: ResearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Failed to parse remote agent response: {}", e)))?;

        Ok(AgentReply::Answer(
            body.final_output
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "No response".to_string()),
        ))
    }
}

/// Human-readable message for a non-success status.
pub fn status_message(status: StatusCode) -> String {
    if status == StatusCode::FORBIDDEN {
        return FORBIDDEN_MESSAGE.to_string();
    }
    format!(
        "API Error: {} - {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}
