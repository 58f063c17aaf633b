use sentoogle_agent::AssistantGateway;
use sentoogle_core::{AiAction, Config, Paths, SettingsStore};

pub fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let settings = SettingsStore::new(&paths).load();
    println!("AI settings ({})", paths.settings_file().display());
    for action in AiAction::ALL {
        println!("  {:<10} {}", action.as_str(), settings.get(action));
    }
    Ok(())
}

pub fn set(action: &str, model: &str) -> anyhow::Result<()> {
    let paths = Paths::new();
    let action: AiAction = action.parse()?;

    let config = Config::load_or_default(&paths)?;
    let known = AssistantGateway::from_config(&config).model_keys();
    if !known.iter().any(|k| k == model) {
        anyhow::bail!("unknown model '{}'; available: {}", model, known.join(", "));
    }

    let store = SettingsStore::new(&paths);
    let mut settings = store.load();
    settings.set(action, model);
    store.save(&settings)?;
    println!("{} now uses {}", action, model);
    Ok(())
}
