use sentoogle_core::{Config, Paths};

/// Show the current configuration as pretty-printed JSON.
pub fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    println!();
    println!("Current configuration");
    println!("  File: {}", paths.config_file().display());
    println!(
        "  Remote agent credential: {}",
        if config.remote_agent_api_key().is_some() { "set" } else { "not set" }
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let path = paths.config_file();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    paths.ensure_dirs()?;
    Config::default().save(&path)?;
    println!("Wrote {}", path.display());
    println!("Add your Fireworks key under providers.fireworks.apiKey to use the local model tiers.");
    Ok(())
}
