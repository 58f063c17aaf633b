use sentoogle_browser::{NavigationController, Panel, SurfaceEvent, TabId};
use sentoogle_core::{AiAction, AiSettings, Result, SettingsStore};
use tracing::info;

use crate::executor::{AgentCommandExecutor, CommandOutcome};
use crate::gateway::AssistantGateway;

/// The operations the chrome layer can invoke, one at a time.
///
/// Every call borrows the shell mutably, so a second command cannot start
/// while one is in flight; callers queue commands on their own event loop.
pub struct Shell {
    nav: NavigationController,
    gateway: AssistantGateway,
    executor: AgentCommandExecutor,
    store: SettingsStore,
    settings: AiSettings,
}

impl Shell {
    pub fn new(
        nav: NavigationController,
        gateway: AssistantGateway,
        executor: AgentCommandExecutor,
        store: SettingsStore,
    ) -> Self {
        let settings = store.load();
        Self {
            nav,
            gateway,
            executor,
            store,
            settings,
        }
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.nav
    }

    pub fn gateway(&self) -> &AssistantGateway {
        &self.gateway
    }

    pub async fn create_tab(&mut self, initial: Option<&str>) -> Result<TabId> {
        self.nav.create_tab(initial).await
    }

    pub async fn switch_tab(&mut self, id: &str) {
        self.nav.switch_tab(Some(id)).await
    }

    pub async fn close_tab(&mut self, id: &str) -> bool {
        self.nav.close_tab(id).await
    }

    pub async fn reload(&mut self) -> Result<()> {
        self.nav.reload().await
    }

    pub async fn go_back(&mut self) -> Result<()> {
        self.nav.go_back().await
    }

    pub async fn go_forward(&mut self) -> Result<()> {
        self.nav.go_forward().await
    }

    pub async fn navigate(&mut self, input: &str) -> Result<()> {
        self.nav.navigate(input).await
    }

    pub async fn open_panel(&mut self, panel: Panel) -> Result<TabId> {
        self.nav.open_panel(panel).await
    }

    pub async fn resize(&mut self, width: u32, height: u32) {
        self.nav.resize(width, height).await
    }

    pub async fn handle_surface_event(&mut self, event: SurfaceEvent) {
        self.nav.handle_surface_event(event).await
    }

    pub async fn execute_command(&mut self, instruction: &str) -> CommandOutcome {
        let model = self.settings.get(AiAction::Command).to_string();
        info!(model = %model, "Executing command");
        self.executor
            .execute(&mut self.nav, &self.gateway, &model, instruction)
            .await
    }

    /// `action` picks the model from settings; unknown actions use the chat model.
    pub async fn query_ai(&mut self, text: &str, tab_id: Option<&str>, action: &str) -> String {
        let model = self.settings.model_for(action).to_string();
        self.gateway
            .query(self.nav.registry_mut(), text, &model, tab_id)
            .await
    }

    pub fn get_ai_settings(&self) -> &AiSettings {
        &self.settings
    }

    pub fn save_ai_setting(&mut self, action: AiAction, model: &str) -> Result<()> {
        self.settings.set(action, model);
        self.store.save(&self.settings)?;
        info!(action = %action, model = %model, "AI setting saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{gateway_with, CannedProvider};
    use sentoogle_browser::testing::FakeSurfaceFactory;
    use sentoogle_browser::Notifier;
    use sentoogle_core::config::ShellConfig;
    use sentoogle_core::Paths;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc::unbounded_channel;

    fn shell(dir: &TempDir, gateway: AssistantGateway) -> Shell {
        let (surface_tx, _surface_rx) = unbounded_channel();
        let (notifier, _shell_rx) = Notifier::channel();
        let nav = NavigationController::new(
            Arc::new(FakeSurfaceFactory::new()),
            surface_tx,
            notifier,
            &ShellConfig::default(),
        );
        let store = SettingsStore::new(&Paths::with_base(dir.path().to_path_buf()));
        Shell::new(nav, gateway, AgentCommandExecutor::new(Duration::ZERO), store)
    }

    #[tokio::test]
    async fn test_save_setting_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut s = shell(&dir, gateway_with(vec![]));
        s.save_ai_setting(AiAction::Chat, "dobby8b").unwrap();

        let settings = s.get_ai_settings();
        assert_eq!(settings.chat, "dobby8b");
        assert_eq!(settings.summarize, "dobby70b");
        assert_eq!(settings.explain, "dobby70b");
        assert_eq!(settings.command, "dobby70b");

        let reopened = shell(&dir, gateway_with(vec![]));
        assert_eq!(reopened.get_ai_settings().chat, "dobby8b");
    }

    #[tokio::test]
    async fn test_query_uses_model_for_action() {
        let dir = TempDir::new().unwrap();
        let big = CannedProvider::ok("from 70b");
        let small = CannedProvider::ok("from 8b");
        let mut s = shell(&dir, gateway_with(vec![("dobby70b", big), ("dobby8b", small)]));
        s.save_ai_setting(AiAction::Summarize, "dobby8b").unwrap();

        assert_eq!(s.query_ai("text", None, "summarize").await, "from 8b");
        assert_eq!(s.query_ai("text", None, "explain").await, "from 70b");
        assert_eq!(s.query_ai("text", None, "translate").await, "from 70b");
    }

    #[tokio::test]
    async fn test_execute_command_uses_command_model() {
        let dir = TempDir::new().unwrap();
        let mut s = shell(
            &dir,
            gateway_with(vec![(
                "dobby8b",
                CannedProvider::ok(r#"{"actions":[{"type":"navigate","url":"https://example.com"}]}"#),
            )]),
        );
        let outcome = s.execute_command("open example").await;
        assert!(outcome.message.starts_with("Error generating actions: Unknown model"));

        s.save_ai_setting(AiAction::Command, "dobby8b").unwrap();
        let outcome = s.execute_command("open example").await;
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(s.navigation().registry().len(), 2);
    }
}
