pub mod client;
pub mod factory;
pub mod openai;
pub mod remote_agent;

use async_trait::async_trait;
use sentoogle_core::Result;

/// A text-completion capability: given a prompt, return the model's text.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

pub use factory::{create_local_models, create_provider, default_api_base};
pub use openai::OpenAIProvider;
pub use remote_agent::{AgentReply, RemoteAgentClient};
