//! Rolling per-tab conversation history for the remote agent.

use serde::{Deserialize, Serialize};

/// Most messages a context holds after an exchange is recorded.
pub const CONTEXT_CAPACITY: usize = 8;
/// How many of the oldest messages go once the capacity is exceeded.
pub const CONTEXT_EVICTION: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    System,
    User,
    Agent,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Agent => "AGENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

impl ContextMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// `[ROLE]: content`
    pub fn transcript_line(&self) -> String {
        format!("[{}]: {}", self.role.label(), self.content)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    messages: Vec<ContextMessage>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ContextMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a user turn and the agent's reply, then prune.
    ///
    /// Pruning drops the oldest four messages (two whole exchanges) when the
    /// length goes past eight; exactly eight is kept as is.
    pub fn record_exchange(&mut self, user: &str, reply: &str) {
        self.messages.push(ContextMessage::new(Role::User, user));
        self.messages.push(ContextMessage::new(Role::Agent, reply));
        if self.messages.len() > CONTEXT_CAPACITY {
            self.messages.drain(..CONTEXT_EVICTION);
        }
    }
}
