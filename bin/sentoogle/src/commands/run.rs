use sentoogle_agent::{AgentCommandExecutor, AssistantGateway, Shell};
use sentoogle_browser::{BrowserHost, LaunchOptions, NavigationController, Notifier, Panel, ShellEvent};
use sentoogle_core::{AiAction, Config, Paths, SettingsStore};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const HELP: &str = "\
Commands:
  <text>                 navigate the active tab (URL or search)
  /new [url]             open a tab
  /tabs                  list tabs
  /switch <id>           switch to a tab (\"home\" for the home view)
  /close <id>            close a tab
  /back /forward /reload history of the active tab
  /do <instruction>      let the agent act on the page
  /chat <text>           ask the assistant about the active tab
  /summarize <text>      summarize text with the summarize model
  /explain <text>        explain text with the explain model
  /panel chat|settings   open the AI chat or settings panel
  /settings              show model selection
  /set <action> <model>  choose the model for an action
  /resize <w> <h>        resize the content region
  /help                  this text
  /quit                  exit";

pub async fn run(open: Option<String>, headless: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;
    let mut shell_config = config.shell.clone();
    shell_config.headless |= headless;

    let host = Arc::new(
        BrowserHost::launch(LaunchOptions {
            browser_path: shell_config.browser_path.clone(),
            profile_dir: paths.browser_profile_dir(),
            headless: shell_config.headless,
            window: shell_config.window,
        })
        .await?,
    );

    let (surface_tx, mut surface_rx) = mpsc::unbounded_channel();
    let (notifier, mut shell_rx) = Notifier::channel();
    let nav = NavigationController::new(host.clone(), surface_tx, notifier, &shell_config);
    let executor = AgentCommandExecutor::new(Duration::from_millis(shell_config.settle_ms));
    let mut shell = Shell::new(
        nav,
        AssistantGateway::from_config(&config),
        executor,
        SettingsStore::new(&paths),
    );

    if let Some(target) = open {
        shell.navigate(&target).await?;
    }

    // A plain thread: a blocking stdin read must not hold up runtime shutdown.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("sentoogle shell (/help for commands, /quit to exit)");
    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else { break };
                if !handle_line(&mut shell, line.trim()).await {
                    break;
                }
            }
            Some(event) = surface_rx.recv() => shell.handle_surface_event(event).await,
            Some(event) = shell_rx.recv() => on_notification(&mut shell, event).await,
        }
    }

    info!("Shutting down");
    host.shutdown().await;
    Ok(())
}

/// Returns false when the shell should exit.
async fn handle_line(shell: &mut Shell, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };
    if !command.starts_with('/') {
        report(shell.navigate(line).await);
        return true;
    }

    match command {
        "/quit" | "/exit" => return false,
        "/help" => println!("{}", HELP),
        "/new" => {
            let initial = (!rest.is_empty()).then_some(rest);
            match shell.create_tab(initial).await {
                Ok(id) => println!("Opened tab {}", id),
                Err(e) => println!("Error: {}", e),
            }
        }
        "/tabs" => print_tabs(shell),
        "/switch" if !rest.is_empty() => shell.switch_tab(rest).await,
        "/close" if !rest.is_empty() => {
            if !shell.close_tab(rest).await {
                println!("No tab {}", rest);
            }
        }
        "/back" => report(shell.go_back().await),
        "/forward" => report(shell.go_forward().await),
        "/reload" => report(shell.reload().await),
        "/do" if !rest.is_empty() => {
            let outcome = shell.execute_command(rest).await;
            let mark = if outcome.success { "ok" } else { "failed" };
            println!("[{}] {}", mark, outcome.message);
        }
        "/chat" if !rest.is_empty() => ask(shell, rest, "chat").await,
        "/summarize" if !rest.is_empty() => ask(shell, &summarize_prompt(rest), "summarize").await,
        "/explain" if !rest.is_empty() => ask(shell, &explain_prompt(rest), "explain").await,
        "/panel" => {
            let panel = match rest {
                "chat" => Panel::AiChat,
                "settings" => Panel::Settings,
                _ => {
                    println!("Usage: /panel chat|settings");
                    return true;
                }
            };
            report(shell.open_panel(panel).await.map(|_| ()));
        }
        "/settings" => {
            let settings = shell.get_ai_settings();
            for action in AiAction::ALL {
                println!("  {:<10} {}", action.as_str(), settings.get(action));
            }
            println!("  available: {}", shell.gateway().model_keys().join(", "));
        }
        "/set" => {
            let mut parts = rest.split_whitespace();
            match (parts.next().map(str::parse::<AiAction>), parts.next()) {
                (Some(Ok(action)), Some(model)) => report(shell.save_ai_setting(action, model)),
                _ => println!("Usage: /set chat|summarize|explain|command <model>"),
            }
        }
        "/resize" => {
            let mut parts = rest.split_whitespace().map(str::parse::<u32>);
            match (parts.next(), parts.next()) {
                (Some(Ok(w)), Some(Ok(h))) => shell.resize(w, h).await,
                _ => println!("Usage: /resize <width> <height>"),
            }
        }
        _ => println!("Unknown or incomplete command, see /help"),
    }
    true
}

async fn on_notification(shell: &mut Shell, event: ShellEvent) {
    match event {
        ShellEvent::TabCreated { tab_id, title } => println!("+ tab {} \"{}\"", tab_id, title),
        ShellEvent::TabUpdated { tab_id, title, favicon } => match favicon {
            Some(icon) => println!("~ tab {} \"{}\" ({})", tab_id, title, icon),
            None => println!("~ tab {} \"{}\"", tab_id, title),
        },
        ShellEvent::AddressBar { url } => println!("@ {}", url),
        ShellEvent::ContextMenuSummarize { text } => {
            ask(shell, &summarize_prompt(&text), "summarize").await
        }
        ShellEvent::ContextMenuExplain { text } => ask(shell, &explain_prompt(&text), "explain").await,
    }
}

async fn ask(shell: &mut Shell, text: &str, action: &str) {
    let tab = shell
        .navigation()
        .registry()
        .active_id()
        .map(|id| id.as_str().to_string());
    let reply = shell.query_ai(text, tab.as_deref(), action).await;
    println!("\n{}\n", reply);
}

fn summarize_prompt(text: &str) -> String {
    format!("Summarize the following text:\n\n{}", text)
}

fn explain_prompt(text: &str) -> String {
    format!("Tell me more about the following text:\n\n{}", text)
}

fn print_tabs(shell: &Shell) {
    let registry = shell.navigation().registry();
    let active = registry.active_id();
    for id in registry.ids() {
        let Some(tab) = registry.get(id.as_str()) else {
            continue;
        };
        let marker = if Some(id) == active { '*' } else { ' ' };
        println!("{} {:<15} {}", marker, id.as_str(), tab.title);
    }
}

fn report(result: sentoogle_core::Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Command failed");
        println!("Error: {}", e);
    }
}
