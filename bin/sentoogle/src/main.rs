mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sentoogle")]
#[command(about = "A tabbed browser shell with an AI assistant and a browser agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the browser and the interactive shell
    Run {
        /// Open this URL or search in the first tab
        #[arg(short, long)]
        open: Option<String>,

        /// Run the browser without visible windows
        #[arg(long)]
        headless: bool,
    },

    /// Ask the assistant a single question
    Ask {
        /// Question text
        text: String,

        /// AI action whose model answers (chat, summarize, explain, command)
        #[arg(short, long, default_value = "chat")]
        action: String,

        /// Use this model key instead of the one configured for the action
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage per-action model selection
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show the model used for each AI action
    Show,
    /// Choose the model for an AI action
    Set {
        /// chat, summarize, explain or command
        action: String,
        /// Model key, e.g. dobby70b, dobby8b or roma
        model: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { open, headless } => {
            commands::run::run(open, headless).await?;
        }
        Commands::Ask { text, action, model } => {
            commands::ask::run(&text, &action, model.as_deref()).await?;
        }
        Commands::Settings { command } => match command {
            SettingsCommands::Show => commands::settings_cmd::show()?,
            SettingsCommands::Set { action, model } => commands::settings_cmd::set(&action, &model)?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_cmd::show()?,
            ConfigCommands::Init { force } => commands::config_cmd::init(force)?,
        },
    }

    Ok(())
}
