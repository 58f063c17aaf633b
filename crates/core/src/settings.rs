use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::paths::Paths;

/// What the user is asking the assistant to do; each maps to a model key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiAction {
    Chat,
    Summarize,
    Explain,
    Command,
}

impl AiAction {
    pub const ALL: [AiAction; 4] = [
        AiAction::Chat,
        AiAction::Summarize,
        AiAction::Explain,
        AiAction::Command,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiAction::Chat => "chat",
            AiAction::Summarize => "summarize",
            AiAction::Explain => "explain",
            AiAction::Command => "command",
        }
    }
}

impl FromStr for AiAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Ok(AiAction::Chat),
            "summarize" => Ok(AiAction::Summarize),
            "explain" => Ok(AiAction::Explain),
            "command" => Ok(AiAction::Command),
            other => Err(Error::Validation(format!("unknown AI action '{}'", other))),
        }
    }
}

impl std::fmt::Display for AiAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_MODEL_KEY: &str = "dobby70b";

fn default_model_key() -> String {
    DEFAULT_MODEL_KEY.to_string()
}

/// Model key per AI action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiSettings {
    #[serde(default = "default_model_key")]
    pub chat: String,
    #[serde(default = "default_model_key")]
    pub summarize: String,
    #[serde(default = "default_model_key")]
    pub explain: String,
    #[serde(default = "default_model_key")]
    pub command: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            chat: default_model_key(),
            summarize: default_model_key(),
            explain: default_model_key(),
            command: default_model_key(),
        }
    }
}

impl AiSettings {
    pub fn get(&self, action: AiAction) -> &str {
        match action {
            AiAction::Chat => &self.chat,
            AiAction::Summarize => &self.summarize,
            AiAction::Explain => &self.explain,
            AiAction::Command => &self.command,
        }
    }

    pub fn set(&mut self, action: AiAction, model: &str) {
        let slot = match action {
            AiAction::Chat => &mut self.chat,
            AiAction::Summarize => &mut self.summarize,
            AiAction::Explain => &mut self.explain,
            AiAction::Command => &mut self.command,
        };
        *slot = model.to_string();
    }

    /// Model for a free-form action name; unknown or empty slots use the chat model.
    pub fn model_for(&self, action: &str) -> &str {
        match action.parse::<AiAction>() {
            Ok(a) if !self.get(a).is_empty() => self.get(a),
            _ => &self.chat,
        }
    }
}

/// Persists [`AiSettings`] as JSON next to the config file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(paths: &Paths) -> Self {
        Self {
            path: paths.settings_file(),
        }
    }

    pub fn load(&self) -> AiSettings {
        if !self.path.exists() {
            return AiSettings::default();
        }
        match std::fs::read_to_string(&self.path)
            .map_err(Error::from)
            .and_then(|raw| serde_json::from_str::<AiSettings>(&raw).map_err(Error::from))
        {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to read AI settings, using defaults");
                AiSettings::default()
            }
        }
    }

    pub fn save(&self, settings: &AiSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        debug!(path = %self.path.display(), "AI settings saved");
        Ok(())
    }
}
