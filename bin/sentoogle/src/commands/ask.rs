use sentoogle_agent::AssistantGateway;
use sentoogle_browser::ViewRegistry;
use sentoogle_core::{Config, Paths, SettingsStore};

/// One-off question outside any tab, so no conversation context is kept.
pub async fn run(text: &str, action: &str, model: Option<&str>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let settings = SettingsStore::new(&paths).load();
    let model = model.unwrap_or_else(|| settings.model_for(action));

    let gateway = AssistantGateway::from_config(&config);
    let mut registry = ViewRegistry::new();
    let reply = gateway.query(&mut registry, text, model, None).await;
    println!("{}", reply);
    Ok(())
}
