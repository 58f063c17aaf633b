use sentoogle_core::{Config, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{OpenAIProvider, Provider};

/// Default OpenAI-compatible base URL per provider name.
pub fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "together" => "https://api.together.xyz/v1",
        "ollama" => "http://localhost:11434/v1",
        _ => "https://api.openai.com/v1",
    }
}

/// Build the provider serving `model` through `provider_name`.
pub fn create_provider(config: &Config, provider_name: &str, model: &str) -> Result<Arc<dyn Provider>> {
    let provider_cfg = config.get_provider(provider_name).ok_or_else(|| {
        Error::Config(format!(
            "Provider '{}' is referenced by a model but not found in providers section",
            provider_name
        ))
    })?;

    if !provider_cfg.has_api_key() && provider_name != "ollama" {
        warn!(provider = provider_name, "Provider has no API key; calls will fail until one is configured");
    }

    let api_base = provider_cfg
        .api_base
        .as_deref()
        .unwrap_or_else(|| default_api_base(provider_name));
    let api_key = if provider_cfg.has_api_key() {
        provider_cfg.api_key.as_str()
    } else if provider_name == "ollama" {
        "ollama"
    } else {
        ""
    };

    let proxy = config.proxy_for(provider_name);
    Ok(Arc::new(OpenAIProvider::new_with_proxy(api_key, api_base, model, proxy.as_deref())))
}

/// Providers for every local model tier in `config.models`, keyed by model key.
/// Tiers whose provider cannot be built are skipped with a warning.
pub fn create_local_models(config: &Config) -> HashMap<String, Arc<dyn Provider>> {
    let mut models = HashMap::new();
    for (key, model_cfg) in &config.models {
        match create_provider(config, &model_cfg.provider, &model_cfg.model) {
            Ok(provider) => {
                debug!(key = %key, provider = %model_cfg.provider, model = %model_cfg.model, "Local model tier ready");
                models.insert(key.clone(), provider);
            }
            Err(e) => warn!(key = %key, error = %e, "Skipping local model tier"),
        }
    }
    models
}
