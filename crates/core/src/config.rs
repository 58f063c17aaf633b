use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

/// Environment variable consulted when `remoteAgent.apiKey` is empty.
pub const REMOTE_AGENT_KEY_ENV: &str = "XERO_API_KEY";

const PLACEHOLDER_KEYS: &[&str] = &["", "dummy", "your_xero_api_key_here", "your_fireworks_api_key_here"];

fn is_placeholder(key: &str) -> bool {
    PLACEHOLDER_KEYS.contains(&key.trim())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    /// `Some("")` forces a direct connection even if `network.proxy` is set.
    #[serde(default)]
    pub proxy: Option<String>,
}

impl ProviderConfig {
    pub fn has_api_key(&self) -> bool {
        !is_placeholder(&self.api_key)
    }
}

/// A local model tier: which provider serves it and under what model id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
}

pub const MODEL_70B: &str = "accounts/sentientfoundation/models/dobby-unhinged-llama-3-3-70b-new";
pub const MODEL_8B: &str =
    "accounts/sentientfoundation-serverless/models/dobby-mini-unhinged-plus-llama-3-1-8b";

fn default_models() -> HashMap<String, ModelConfig> {
    let mut models = HashMap::new();
    models.insert(
        "dobby70b".to_string(),
        ModelConfig {
            provider: "fireworks".to_string(),
            model: MODEL_70B.to_string(),
        },
    );
    models.insert(
        "dobby8b".to_string(),
        ModelConfig {
            provider: "fireworks".to_string(),
            model: MODEL_8B.to_string(),
        },
    );
    models
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAgentConfig {
    /// Model key that routes a query to the remote agent.
    #[serde(default = "default_remote_model_key")]
    pub model_key: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_remote_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_remote_model_key() -> String {
    "roma".to_string()
}

fn default_remote_endpoint() -> String {
    "https://api-sentient-roma-rex.ddnsfree.com/proxy/research".to_string()
}

fn default_remote_timeout_secs() -> u64 {
    300
}

impl Default for RemoteAgentConfig {
    fn default() -> Self {
        Self {
            model_key: default_remote_model_key(),
            api_key: String::new(),
            endpoint: default_remote_endpoint(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowConfig {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default = "default_window_width")]
    pub width: u32,
    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_window_width() -> u32 {
    1200
}

fn default_window_height() -> u32 {
    800
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    #[serde(default)]
    pub window: WindowConfig,
    /// Height reserved at the top of the window for the address bar and tab strip.
    #[serde(default = "default_chrome_offset")]
    pub chrome_offset: u32,
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,
    /// Pause after every executed action so the page can settle.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub browser_path: Option<String>,
}

fn default_chrome_offset() -> u32 {
    82
}

fn default_search_endpoint() -> String {
    "https://www.google.com/search?q=".to_string()
}

fn default_settle_ms() -> u64 {
    2000
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            chrome_offset: default_chrome_offset(),
            search_endpoint: default_search_endpoint(),
            settle_ms: default_settle_ms(),
            headless: false,
            browser_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert("fireworks".to_string(), ProviderConfig::default());
    providers
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_models")]
    pub models: HashMap<String, ModelConfig>,
    #[serde(default)]
    pub remote_agent: RemoteAgentConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            models: default_models(),
            remote_agent: RemoteAgentConfig::default(),
            shell: ShellConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Remote agent credential from config, falling back to `XERO_API_KEY`.
    /// Placeholder values count as unset.
    pub fn remote_agent_api_key(&self) -> Option<String> {
        let key = self.remote_agent.api_key.trim();
        if !is_placeholder(key) {
            return Some(key.to_string());
        }
        std::env::var(REMOTE_AGENT_KEY_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !is_placeholder(v))
    }

    /// Effective proxy for a provider: provider override wins, `Some("")` means direct.
    pub fn proxy_for(&self, provider: &str) -> Option<String> {
        match self.providers.get(provider).and_then(|p| p.proxy.as_deref()) {
            Some("") => None,
            Some(p) => Some(p.to_string()),
            None => self.network.proxy.clone().filter(|p| !p.is_empty()),
        }
    }
}
