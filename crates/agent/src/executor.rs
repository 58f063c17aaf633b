//! Turns a free-text instruction into browser actions and runs them.

use sentoogle_browser::{NavigationController, TabId};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::gateway::{AssistantGateway, QueryOutcome};
use crate::plan::{parse_plan, Action, ActionPlan};

/// Pause after each action so navigation and DOM updates can settle.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

pub const NO_WEB_TAB: &str = "No web tab active for actions.";

const ELEMENT_NOT_FOUND: &str = "Element not found";

/// Result handed back to the chrome layer. `message` is the `; `-joined
/// per-action log, or a single `Error...` line for terminal failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    fn failed(message: String) -> Self {
        warn!(message = %message, "Command aborted");
        Self {
            success: false,
            message,
        }
    }
}

pub fn command_prompt(instruction: &str) -> String {
    format!(
        r##"You are a browser agent. Generate JSON with actions: {{"actions": [{{"type": "navigate", "url": "https://..."}}, {{"type": "click", "selector": "#id"}}, {{"type": "type", "selector": "input", "text": "text"}}]}}. Respond only with valid JSON, no additional text or explanations. Query: {}"##,
        instruction
    )
}

#[derive(Debug, Clone)]
pub struct AgentCommandExecutor {
    settle: Duration,
}

impl Default for AgentCommandExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}

impl AgentCommandExecutor {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    /// Plan with `model_key`, then run the plan. Never fails: every problem
    /// ends up in the outcome's message.
    pub async fn execute(
        &self,
        nav: &mut NavigationController,
        gateway: &AssistantGateway,
        model_key: &str,
        instruction: &str,
    ) -> CommandOutcome {
        let prompt = command_prompt(instruction);
        let reply = match gateway.try_query(nav.registry_mut(), &prompt, model_key, None).await {
            Ok(QueryOutcome::Answer(text)) => text,
            Ok(QueryOutcome::Notice(notice)) => {
                return CommandOutcome::failed(format!("Error generating actions: {}", notice))
            }
            Err(e) => return CommandOutcome::failed(format!("Error generating actions: {}", e)),
        };

        let plan = match parse_plan(&reply) {
            Ok(plan) => plan,
            Err(e) => return CommandOutcome::failed(format!("Error: {}", e)),
        };
        info!(actions = plan.actions.len(), "Action plan ready");

        if let Some(url) = plan.first_navigation() {
            if let Err(e) = nav.create_tab(Some(url)).await {
                return CommandOutcome::failed(format!("Error: {}", e));
            }
        } else {
            let eligible = nav
                .registry()
                .active_tab()
                .map(|t| t.is_web_content())
                .unwrap_or(false);
            if !eligible {
                return CommandOutcome::failed(format!("Error: {}", NO_WEB_TAB));
            }
        }

        self.run_plan(nav, &plan).await
    }

    async fn run_plan(&self, nav: &mut NavigationController, plan: &ActionPlan) -> CommandOutcome {
        let Some(tab_id) = nav.registry().active_id().cloned() else {
            return CommandOutcome::failed(format!("Error: {}", NO_WEB_TAB));
        };

        let mut success = true;
        let mut log = Vec::with_capacity(plan.actions.len());
        for action in &plan.actions {
            let result = self.run_action(nav, &tab_id, action).await;
            let status = match result {
                Ok(()) => "Success".to_string(),
                Err(reason) => {
                    success = false;
                    reason
                }
            };
            debug!(kind = action.kind(), target = %action.target(), status = %status, "Action finished");
            log.push(format!("Action {} ({}): {}", action.kind(), action.target(), status));
            tokio::time::sleep(self.settle).await;
        }

        CommandOutcome {
            success,
            message: log.join("; "),
        }
    }

    /// One action against `tab_id`; the error is the text to log for it.
    async fn run_action(
        &self,
        nav: &mut NavigationController,
        tab_id: &TabId,
        action: &Action,
    ) -> std::result::Result<(), String> {
        if let Action::Navigate { url } = action {
            return nav.load_in_active(url).await.map_err(|e| e.to_string());
        }

        let surface = nav
            .registry()
            .get(tab_id.as_str())
            .and_then(|t| t.surface())
            .ok_or_else(|| format!("Tab {} is no longer open", tab_id))?;

        let selector = action.target();
        if !surface.element_exists(selector).await.map_err(|e| e.to_string())? {
            return Err(ELEMENT_NOT_FOUND.to_string());
        }
        let result = match action {
            Action::Click { selector } => surface.click(selector).await,
            Action::Type { selector, text } => surface.set_value(selector, text).await,
            Action::Navigate { .. } => Ok(()),
        };
        result.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{gateway_with, CannedProvider};
    use sentoogle_browser::testing::FakeSurfaceFactory;
    use sentoogle_browser::{Notifier, SurfaceEventReceiver};
    use sentoogle_core::config::ShellConfig;
    use std::sync::Arc;
    use tokio::sync::mpsc::unbounded_channel;

    struct Harness {
        nav: NavigationController,
        factory: FakeSurfaceFactory,
        surface_rx: SurfaceEventReceiver,
        executor: AgentCommandExecutor,
    }

    impl Harness {
        fn new() -> Self {
            let factory = FakeSurfaceFactory::new().with_elements(&["input[name=\"q\"]", "#go"]);
            let (surface_tx, surface_rx) = unbounded_channel();
            let (notifier, _shell_rx) = Notifier::channel();
            let nav = NavigationController::new(
                Arc::new(factory.clone()),
                surface_tx,
                notifier,
                &ShellConfig::default(),
            );
            Self {
                nav,
                factory,
                surface_rx,
                executor: AgentCommandExecutor::new(Duration::ZERO),
            }
        }

        async fn open_page(&mut self, url: &str) -> TabId {
            let id = self.nav.create_tab(Some(url)).await.unwrap();
            while let Ok(event) = self.surface_rx.try_recv() {
                self.nav.handle_surface_event(event).await;
            }
            id
        }

        async fn run(&mut self, model_reply: &str) -> CommandOutcome {
            let gateway = gateway_with(vec![("dobby70b", CannedProvider::ok(model_reply))]);
            self.executor
                .execute(&mut self.nav, &gateway, "dobby70b", "do the thing")
                .await
        }
    }

    #[tokio::test]
    async fn test_missing_element_is_reported_not_raised() {
        let mut h = Harness::new();
        h.open_page("https://example.com").await;
        let outcome = h
            .run(r##"{"actions":[{"type":"click","selector":"#missing"}]}"##)
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Action click (#missing): Element not found");
    }

    #[tokio::test]
    async fn test_navigate_opens_new_tab() {
        let mut h = Harness::new();
        let original = h.open_page("https://example.org").await;
        let outcome = h
            .run("Sure! ```json\n{\"actions\":[{\"type\":\"navigate\",\"url\":\"https://example.com\"}]}\n```")
            .await;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.message, "Action navigate (https://example.com): Success");
        assert_eq!(h.factory.created(), 2);
        let active = h.nav.registry().active_id().unwrap().clone();
        assert_ne!(active, original);
        let surface = h.factory.surface(&active).unwrap();
        assert_eq!(surface.state().url, "https://example.com");
        assert!(!h.nav.registry().get(active.as_str()).unwrap().flags.new);
        assert_eq!(h.nav.compositor().attached(), &[active]);
        assert_eq!(h.factory.surface(&original).unwrap().state().url, "https://example.org");
    }

    #[tokio::test]
    async fn test_type_and_click_in_order() {
        let mut h = Harness::new();
        let id = h.open_page("https://search.example.com").await;
        let outcome = h
            .run(r##"{"actions":[
                {"type":"type","selector":"input[name=\"q\"]","text":"tokio \"select\""},
                {"type":"click","selector":"#go"}
            ]}"##)
            .await;

        assert!(outcome.success);
        assert_eq!(
            outcome.message,
            "Action type (input[name=\"q\"]): Success; Action click (#go): Success"
        );
        let state = h.factory.surface(&id).unwrap().state();
        assert_eq!(state.values.get("input[name=\"q\"]").map(String::as_str), Some("tokio \"select\""));
        assert_eq!(state.clicks, vec!["#go".to_string()]);
    }

    #[tokio::test]
    async fn test_action_failure_does_not_stop_plan() {
        let mut h = Harness::new();
        let id = h.open_page("https://example.com").await;
        h.factory.surface(&id).unwrap().update(|s| {
            s.broken.insert("#go".to_string());
        });
        let outcome = h
            .run(r##"{"actions":[
                {"type":"click","selector":"#go"},
                {"type":"click","selector":"#nope"},
                {"type":"type","selector":"input[name=\"q\"]","text":"still runs"}
            ]}"##)
            .await;

        assert!(!outcome.success);
        let entries: Vec<&str> = outcome.message.split("; ").collect();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].starts_with("Action click (#go): "));
        assert!(entries[0].contains("threw"));
        assert_eq!(entries[1], "Action click (#nope): Element not found");
        assert_eq!(entries[2], "Action type (input[name=\"q\"]): Success");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_follows_every_action() {
        let mut h = Harness::new();
        h.executor = AgentCommandExecutor::default();
        h.open_page("https://example.com").await;

        let start = tokio::time::Instant::now();
        let outcome = h
            .run(r##"{"actions":[
                {"type":"click","selector":"#go"},
                {"type":"click","selector":"#missing"}
            ]}"##)
            .await;

        assert_eq!(
            outcome.message,
            "Action click (#go): Success; Action click (#missing): Element not found"
        );
        assert_eq!(tokio::time::Instant::now() - start, DEFAULT_SETTLE * 2);
    }

    #[tokio::test]
    async fn test_requires_web_tab_without_navigation() {
        let mut h = Harness::new();
        let outcome = h
            .run(r##"{"actions":[{"type":"click","selector":"#go"}]}"##)
            .await;
        assert_eq!(
            outcome,
            CommandOutcome {
                success: false,
                message: format!("Error: {}", NO_WEB_TAB)
            }
        );

        // A tab that never loaded real content is not eligible either.
        h.nav.create_tab(None).await.unwrap();
        let outcome = h
            .run(r##"{"actions":[{"type":"click","selector":"#go"}]}"##)
            .await;
        assert_eq!(outcome.message, format!("Error: {}", NO_WEB_TAB));
    }

    #[tokio::test]
    async fn test_unparseable_reply_embeds_raw_text() {
        let mut h = Harness::new();
        h.open_page("https://example.com").await;
        let outcome = h.run("I would rather not.").await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error: JSON extraction failed"));
        assert!(outcome.message.contains("Raw text: I would rather not."));

        let outcome = h.run(r#"{"result": "ok"}"#).await;
        assert_eq!(outcome.message, "Error: Invalid actions format");
    }

    #[tokio::test]
    async fn test_model_failure_is_terminal() {
        let mut h = Harness::new();
        let gateway = gateway_with(vec![("dobby70b", CannedProvider::failing("API error 503: overloaded"))]);
        let outcome = h
            .executor
            .execute(&mut h.nav, &gateway, "dobby70b", "open rust docs")
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error generating actions: "));
        assert!(outcome.message.contains("overloaded"));

        let outcome = h.executor.execute(&mut h.nav, &gateway, "roma", "open rust docs").await;
        assert!(outcome.message.starts_with("Error generating actions: Please set"));
    }

    #[test]
    fn test_prompt_embeds_instruction_and_schema() {
        let prompt = command_prompt("search for crabs");
        assert!(prompt.ends_with("Query: search for crabs"));
        assert!(prompt.contains(r#"{"type": "type", "selector": "input", "text": "text"}"#));
        assert!(prompt.contains(r##"{"type": "click", "selector": "#id"}"##));
    }
}
