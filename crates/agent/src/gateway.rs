//! Routes assistant queries to a local model tier or the remote research agent.

use sentoogle_browser::{ConversationContext, ContextMessage, Role, ViewRegistry};
use sentoogle_core::config::REMOTE_AGENT_KEY_ENV;
use sentoogle_core::{Config, Result};
use sentoogle_providers::{create_local_models, AgentReply, Provider, RemoteAgentClient};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Generation cap for local model tiers.
pub const LOCAL_MAX_TOKENS: u32 = 500;

pub const UNKNOWN_MODEL: &str = "Unknown model";

pub const SYSTEM_PREAMBLE: &str = "You are Xero, a general-purpose AI agent powered by ROMA and built by Rex. You are helpful, knowledgeable, and conversational. Keep your responses clear and concise. Attached here is a conversation flow between 2 roles, you (Xero) and the user who wants response to his query (user)";

/// What a query produced when nothing went wrong in transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Model output.
    Answer(String),
    /// Displayable explanation of why there is no answer: missing
    /// credential, rejected request or unknown model key.
    Notice(String),
}

impl QueryOutcome {
    pub fn into_text(self) -> String {
        match self {
            QueryOutcome::Answer(t) | QueryOutcome::Notice(t) => t,
        }
    }
}

pub struct AssistantGateway {
    local: HashMap<String, Arc<dyn Provider>>,
    remote_key: String,
    remote: Option<RemoteAgentClient>,
}

impl AssistantGateway {
    pub fn new(
        local: HashMap<String, Arc<dyn Provider>>,
        remote_key: impl Into<String>,
        remote: Option<RemoteAgentClient>,
    ) -> Self {
        Self {
            local,
            remote_key: remote_key.into(),
            remote,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let remote = config.remote_agent_api_key().map(|key| {
            RemoteAgentClient::new(
                &config.remote_agent.endpoint,
                &key,
                config.network.proxy.as_deref().filter(|p| !p.is_empty()),
                Duration::from_secs(config.remote_agent.timeout_secs),
            )
        });
        if remote.is_none() {
            debug!("Remote agent credential not configured");
        }
        Self::new(create_local_models(config), config.remote_agent.model_key.clone(), remote)
    }

    /// Every key this gateway can answer for, sorted.
    pub fn model_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.local.keys().cloned().collect();
        keys.push(self.remote_key.clone());
        keys.sort();
        keys.dedup();
        keys
    }

    /// Query and flatten every failure into displayable text.
    pub async fn query(
        &self,
        registry: &mut ViewRegistry,
        text: &str,
        model_key: &str,
        tab_id: Option<&str>,
    ) -> String {
        match self.try_query(registry, text, model_key, tab_id).await {
            Ok(outcome) => outcome.into_text(),
            Err(e) => {
                warn!(model = %model_key, error = %e, "Assistant query failed");
                format!("Error: {}", e)
            }
        }
    }

    /// Transport and provider failures come back as `Err`; everything the
    /// user should simply read comes back as a [`QueryOutcome`].
    pub async fn try_query(
        &self,
        registry: &mut ViewRegistry,
        text: &str,
        model_key: &str,
        tab_id: Option<&str>,
    ) -> Result<QueryOutcome> {
        if model_key == self.remote_key {
            return self.query_remote(registry, text, tab_id).await;
        }
        let Some(provider) = self.local.get(model_key) else {
            debug!(model = %model_key, "No such model key");
            return Ok(QueryOutcome::Notice(UNKNOWN_MODEL.to_string()));
        };
        info!(model = %model_key, prompt_len = text.len(), "Querying local model");
        let reply = provider.complete(text, LOCAL_MAX_TOKENS).await?;
        Ok(QueryOutcome::Answer(reply))
    }

    async fn query_remote(
        &self,
        registry: &mut ViewRegistry,
        text: &str,
        tab_id: Option<&str>,
    ) -> Result<QueryOutcome> {
        let Some(client) = &self.remote else {
            return Ok(QueryOutcome::Notice(format!(
                "Please set the {} environment variable (or remoteAgent.apiKey in config.json) to use the remote agent.",
                REMOTE_AGENT_KEY_ENV
            )));
        };

        let topic = {
            let context = tab_id
                .and_then(|id| registry.get(id))
                .and_then(|tab| tab.context.as_ref());
            build_transcript(context, text)
        };

        match client.research(&topic).await? {
            AgentReply::Answer(reply) => {
                match tab_id.and_then(|id| registry.context_mut(id)) {
                    Some(context) => context.record_exchange(text, &reply),
                    None => debug!("Reply not tied to a tab, context untouched"),
                }
                Ok(QueryOutcome::Answer(reply))
            }
            AgentReply::Rejected(message) => Ok(QueryOutcome::Notice(message)),
        }
    }
}

/// Preamble, then prior context in order, then the new user turn, one
/// `[ROLE]: content` block each, separated by blank lines.
pub fn build_transcript(context: Option<&ConversationContext>, text: &str) -> String {
    let preamble = ContextMessage::new(Role::System, SYSTEM_PREAMBLE);
    let user = ContextMessage::new(Role::User, text);
    std::iter::once(&preamble)
        .chain(context.map(|c| c.messages()).unwrap_or_default())
        .chain(std::iter::once(&user))
        .map(ContextMessage::transcript_line)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentoogle_browser::testing::FakeSurface;
    use sentoogle_browser::TabId;
    use sentoogle_core::Error;
    use std::sync::Mutex;
    use wiremock::matchers::{bearer_token, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replies with a fixed text and remembers what it was asked.
    pub(crate) struct CannedProvider {
        reply: std::result::Result<String, String>,
        pub calls: Mutex<Vec<(String, u32)>>,
    }

    impl CannedProvider {
        pub(crate) fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for CannedProvider {
        async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
            self.calls.lock().unwrap().push((prompt.to_string(), max_tokens));
            self.reply.clone().map_err(Error::Provider)
        }
    }

    pub(crate) fn gateway_with(models: Vec<(&str, Arc<CannedProvider>)>) -> AssistantGateway {
        let local = models
            .into_iter()
            .map(|(k, p)| (k.to_string(), p as Arc<dyn Provider>))
            .collect();
        AssistantGateway::new(local, "roma", None)
    }

    fn remote_gateway(server: &MockServer) -> AssistantGateway {
        let client = RemoteAgentClient::new(&server.uri(), "xk-test", None, Duration::from_secs(5));
        AssistantGateway::new(HashMap::new(), "roma", Some(client))
    }

    fn registry_with_tab() -> (ViewRegistry, TabId) {
        let mut registry = ViewRegistry::new();
        let id = registry.next_tab_id();
        registry.create(id.clone(), FakeSurface::boxed(), "New Tab").unwrap();
        (registry, id)
    }

    #[tokio::test]
    async fn test_local_tier_returns_text_verbatim() {
        let provider = CannedProvider::ok("  Rust is a systems language.\n");
        let gateway = gateway_with(vec![("dobby8b", provider.clone())]);
        let mut registry = ViewRegistry::new();

        let reply = gateway.query(&mut registry, "what is rust", "dobby8b", None).await;
        assert_eq!(reply, "  Rust is a systems language.\n");
        assert_eq!(
            provider.calls.lock().unwrap().as_slice(),
            &[("what is rust".to_string(), LOCAL_MAX_TOKENS)]
        );
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let gateway = gateway_with(vec![]);
        let mut registry = ViewRegistry::new();
        assert_eq!(gateway.query(&mut registry, "hi", "gpt-9", None).await, UNKNOWN_MODEL);
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_text() {
        let gateway = gateway_with(vec![("dobby70b", CannedProvider::failing("API error 500: boom"))]);
        let mut registry = ViewRegistry::new();
        let reply = gateway.query(&mut registry, "hi", "dobby70b", None).await;
        assert!(reply.starts_with("Error: "));
        assert!(reply.contains("boom"));
    }

    #[tokio::test]
    async fn test_remote_without_credential_explains() {
        let gateway = gateway_with(vec![]);
        let (mut registry, id) = registry_with_tab();
        let reply = gateway.query(&mut registry, "hi", "roma", Some(id.as_str())).await;
        assert!(reply.contains(REMOTE_AGENT_KEY_ENV));
        assert!(registry.get(id.as_str()).unwrap().context.is_none());
    }

    #[tokio::test]
    async fn test_remote_records_context_and_replays_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(bearer_token("xk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "final_output": "Paris."
            })))
            .mount(&server)
            .await;

        let gateway = remote_gateway(&server);
        let (mut registry, id) = registry_with_tab();

        let first = gateway
            .query(&mut registry, "capital of France?", "roma", Some(id.as_str()))
            .await;
        assert_eq!(first, "Paris.");
        assert_eq!(registry.get(id.as_str()).unwrap().context.as_ref().unwrap().len(), 2);

        gateway
            .query(&mut registry, "and its population?", "roma", Some(id.as_str()))
            .await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(
            body["topic"].as_str().unwrap(),
            format!(
                "[SYSTEM]: {}\n\n[USER]: capital of France?\n\n[AGENT]: Paris.\n\n[USER]: and its population?",
                SYSTEM_PREAMBLE
            )
        );
    }

    #[tokio::test]
    async fn test_remote_forbidden_is_not_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let gateway = remote_gateway(&server);
        let (mut registry, id) = registry_with_tab();
        let reply = gateway.query(&mut registry, "hi", "roma", Some(id.as_str())).await;
        assert!(reply.contains("API key"));
        assert!(reply.contains("permissions"));
        assert!(registry.get(id.as_str()).unwrap().context.is_none());
    }

    #[tokio::test]
    async fn test_remote_other_status_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let gateway = remote_gateway(&server);
        let mut registry = ViewRegistry::new();
        let outcome = gateway.try_query(&mut registry, "hi", "roma", None).await.unwrap();
        assert_eq!(outcome, QueryOutcome::Notice("API Error: 502 - Bad Gateway".to_string()));
    }

    #[test]
    fn test_transcript_without_context() {
        assert_eq!(
            build_transcript(None, "hello"),
            format!("[SYSTEM]: {}\n\n[USER]: hello", SYSTEM_PREAMBLE)
        );
    }

    #[test]
    fn test_model_keys_include_remote() {
        let gateway = gateway_with(vec![("dobby8b", CannedProvider::ok("")), ("dobby70b", CannedProvider::ok(""))]);
        assert_eq!(gateway.model_keys(), vec!["dobby70b", "dobby8b", "roma"]);
    }
}
