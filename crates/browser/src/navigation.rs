//! Tab lifecycle: creation, address-bar navigation, switching, closing and
//! the reaction to surfaces finishing a load.

use sentoogle_core::config::ShellConfig;
use sentoogle_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::compositor::ViewCompositor;
use crate::events::{Notifier, ShellEvent};
use crate::input::{classify_input, domain_title, fallback_favicon, is_loadable};
use crate::registry::{Panel, TabId, ViewRegistry, NEW_TAB_TITLE};
use crate::surface::{
    ContextMenuItem, RenderSurface, SurfaceEvent, SurfaceEventSender, SurfaceFactory, BLANK_URL,
};

/// Returns the href of the page's declared icon, or null.
const FAVICON_SCRIPT: &str = r#"(() => {
  const link = document.querySelector('link[rel~="icon"], link[rel="shortcut icon"], link[rel="apple-touch-icon"]');
  return link && link.href ? link.href : null;
})()"#;

pub struct NavigationController {
    registry: ViewRegistry,
    compositor: ViewCompositor,
    factory: Arc<dyn SurfaceFactory>,
    surface_events: SurfaceEventSender,
    notifier: Notifier,
    search_endpoint: String,
}

impl NavigationController {
    pub fn new(
        factory: Arc<dyn SurfaceFactory>,
        surface_events: SurfaceEventSender,
        notifier: Notifier,
        shell: &ShellConfig,
    ) -> Self {
        Self {
            registry: ViewRegistry::new(),
            compositor: ViewCompositor::new(shell.window, shell.chrome_offset),
            factory,
            surface_events,
            notifier,
            search_endpoint: shell.search_endpoint.clone(),
        }
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ViewRegistry {
        &mut self.registry
    }

    pub fn compositor(&self) -> &ViewCompositor {
        &self.compositor
    }

    /// Open a tab, make it active and start loading `initial`.
    ///
    /// The chrome layer hears about the tab before the load begins. Targets
    /// that are neither `http(s)` nor `about:` load the blank page and only
    /// lend the tab its title.
    pub async fn create_tab(&mut self, initial: Option<&str>) -> Result<TabId> {
        let target = initial.map(str::trim).filter(|t| !t.is_empty());
        let title = target.map(domain_title).unwrap_or_else(|| NEW_TAB_TITLE.to_string());

        let id = self.registry.next_tab_id();
        let surface = self
            .factory
            .create_surface(&id, self.surface_events.clone())
            .await?;
        self.registry.create(id.clone(), surface, &title)?;
        self.registry.set_active(Some(id.as_str()));
        info!(tab = %id, title = %title, "Tab created");

        self.notifier.send(ShellEvent::TabCreated {
            tab_id: id.clone(),
            title,
        });
        self.refresh().await;

        let url = match target {
            Some(t) if is_loadable(t) => t,
            _ => BLANK_URL,
        };
        if let Some(surface) = self.registry.get(id.as_str()).and_then(|t| t.surface()) {
            if let Err(e) = surface.load_url(url).await {
                warn!(tab = %id, url = %url, error = %e, "Initial load failed");
            }
        }
        Ok(id)
    }

    /// Address-bar entry: load in the active tab, or in a fresh tab when the
    /// active one has no surface to load into.
    pub async fn navigate(&mut self, input: &str) -> Result<()> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }
        let destination = classify_input(input, &self.search_endpoint);
        let url = destination.url().to_string();
        debug!(input = %input, url = %url, "Navigating");

        let can_load = self
            .registry
            .active_tab()
            .map(|t| t.has_surface())
            .unwrap_or(false);
        if !can_load {
            self.create_tab(Some(&url)).await?;
            return Ok(());
        }
        self.load_in_active(&url).await
    }

    /// Load `url` into the active tab and bring it forward once loaded.
    pub async fn load_in_active(&mut self, url: &str) -> Result<()> {
        let id = {
            let tab = self
                .registry
                .active_tab()
                .ok_or_else(|| Error::NotFound("no active tab".to_string()))?;
            let surface = tab
                .surface()
                .ok_or_else(|| Error::Validation(format!("tab '{}' cannot load pages", tab.id())))?;
            surface.load_url(url).await?;
            tab.id().clone()
        };

        let title = domain_title(url);
        if let Some(tab) = self.registry.get_mut(id.as_str()) {
            tab.flags.new = false;
            tab.title = title.clone();
            // Resolved again once the navigation completes.
            tab.favicon = None;
        }
        self.notifier.send(ShellEvent::TabUpdated {
            tab_id: id,
            title,
            favicon: None,
        });
        self.notifier.send(ShellEvent::AddressBar {
            url: url.to_string(),
        });
        self.refresh().await;
        Ok(())
    }

    /// `None` clears the active pointer; unknown ids are ignored.
    pub async fn switch_tab(&mut self, id: Option<&str>) {
        let Some(id) = id else {
            self.registry.set_active(None);
            self.refresh().await;
            return;
        };
        if !self.registry.set_active(Some(id)) {
            debug!(tab = %id, "Switch to unknown tab ignored");
            return;
        }

        let url = match self.registry.get(id).and_then(|t| t.surface()) {
            Some(surface) => surface.current_url().await.unwrap_or_else(|e| {
                debug!(tab = %id, error = %e, "Could not read current url");
                String::new()
            }),
            None => String::new(),
        };
        let url = if url == BLANK_URL { String::new() } else { url };
        self.notifier.send(ShellEvent::AddressBar { url });
        self.refresh().await;
    }

    /// Returns false when `id` is unknown.
    pub async fn close_tab(&mut self, id: &str) -> bool {
        let was_active = self.registry.active_id().map(|a| a.as_str() == id).unwrap_or(false);
        let Some(tab) = self.registry.remove(id) else {
            debug!(tab = %id, "Close of unknown tab ignored");
            return false;
        };
        let (surface, _context) = tab.into_parts();
        if let Some(surface) = surface {
            if let Err(e) = surface.close().await {
                warn!(tab = %id, error = %e, "Failed to close surface");
            }
        }
        info!(tab = %id, "Tab closed");
        if was_active {
            self.refresh().await;
        }
        true
    }

    /// Open a chrome-rendered panel tab and make it active.
    pub async fn open_panel(&mut self, panel: Panel) -> Result<TabId> {
        let id = self.registry.next_tab_id();
        let title = self.registry.insert_panel(id.clone(), panel)?.title.clone();
        self.registry.set_active(Some(id.as_str()));
        self.notifier.send(ShellEvent::TabCreated {
            tab_id: id.clone(),
            title,
        });
        self.notifier.send(ShellEvent::AddressBar { url: String::new() });
        self.refresh().await;
        Ok(id)
    }

    /// Surface of the active tab if it has real history to move through.
    fn history_surface(&self) -> Option<&dyn RenderSurface> {
        let tab = self.registry.active_tab()?;
        if tab.flags.home || tab.flags.new {
            return None;
        }
        tab.surface()
    }

    pub async fn go_back(&self) -> Result<()> {
        match self.history_surface() {
            Some(surface) => surface.go_back().await,
            None => {
                debug!("Back ignored: no page history in active tab");
                Ok(())
            }
        }
    }

    pub async fn go_forward(&self) -> Result<()> {
        match self.history_surface() {
            Some(surface) => surface.go_forward().await,
            None => {
                debug!("Forward ignored: no page history in active tab");
                Ok(())
            }
        }
    }

    pub async fn reload(&self) -> Result<()> {
        match self.history_surface() {
            Some(surface) => surface.reload().await,
            None => {
                debug!("Reload ignored: no loaded page in active tab");
                Ok(())
            }
        }
    }

    pub async fn handle_surface_event(&mut self, event: SurfaceEvent) {
        if !self.registry.contains(event.tab_id().as_str()) {
            debug!(tab = %event.tab_id(), "Event for closed tab dropped");
            return;
        }
        match event {
            SurfaceEvent::Navigated { tab_id, url } => self.on_navigated(tab_id, url).await,
            SurfaceEvent::ContextMenu { item, selection, .. } => {
                let event = match item {
                    ContextMenuItem::Summarize => ShellEvent::ContextMenuSummarize { text: selection },
                    ContextMenuItem::Explain => ShellEvent::ContextMenuExplain { text: selection },
                };
                self.notifier.send(event);
            }
        }
    }

    async fn on_navigated(&mut self, tab_id: TabId, url: String) {
        if url == BLANK_URL {
            return;
        }
        let favicon = match self.registry.get(tab_id.as_str()).and_then(|t| t.surface()) {
            Some(surface) => resolve_favicon(surface, &url).await,
            None => None,
        };
        let title = domain_title(&url);
        if let Some(tab) = self.registry.get_mut(tab_id.as_str()) {
            tab.flags.new = false;
            tab.title = title.clone();
            tab.favicon = favicon.clone();
        }
        debug!(tab = %tab_id, url = %url, "Navigation completed");

        let is_active = self.registry.active_id() == Some(&tab_id);
        self.notifier.send(ShellEvent::TabUpdated {
            tab_id,
            title,
            favicon,
        });
        if is_active {
            self.notifier.send(ShellEvent::AddressBar { url });
        }
        self.refresh().await;
    }

    /// Re-run the compositor for whatever tab is active.
    pub async fn refresh(&mut self) {
        self.compositor.show(&self.registry, self.registry.active_id()).await;
    }

    pub async fn resize(&mut self, width: u32, height: u32) {
        self.compositor.resize(width, height);
        self.refresh().await;
    }
}

/// Icon declared by the page, else `<origin>/favicon.ico`. Never fails.
async fn resolve_favicon(surface: &dyn RenderSurface, page_url: &str) -> Option<String> {
    match surface.evaluate(FAVICON_SCRIPT).await {
        Ok(Value::String(href)) if !href.is_empty() => Some(href),
        Ok(_) => fallback_favicon(page_url),
        Err(e) => {
            debug!(url = %page_url, error = %e, "Favicon probe failed");
            fallback_favicon(page_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceEventReceiver;
    use crate::testing::FakeSurfaceFactory;
    use serde_json::json;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Harness {
        nav: NavigationController,
        factory: FakeSurfaceFactory,
        surface_rx: SurfaceEventReceiver,
        shell_rx: UnboundedReceiver<ShellEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let factory = FakeSurfaceFactory::new();
            let (surface_tx, surface_rx) = unbounded_channel();
            let (notifier, shell_rx) = Notifier::channel();
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
                shell_rx,
            }
        }

        /// Deliver every queued surface event, as the shell loop would.
        async fn pump(&mut self) {
            while let Ok(event) = self.surface_rx.try_recv() {
                self.nav.handle_surface_event(event).await;
            }
        }

        fn notifications(&mut self) -> Vec<ShellEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.shell_rx.try_recv() {
                out.push(event);
            }
            out
        }
    }

    #[tokio::test]
    async fn test_create_tab_notifies_before_load() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com/page")).await.unwrap();

        assert_eq!(h.nav.registry().active_id(), Some(&id));
        let tab = h.nav.registry().get(id.as_str()).unwrap();
        assert!(tab.flags.new);
        assert_eq!(tab.title, "example.com");
        assert_eq!(
            h.notifications().first(),
            Some(&ShellEvent::TabCreated {
                tab_id: id.clone(),
                title: "example.com".to_string()
            })
        );

        let surface = h.factory.surface(&id).unwrap();
        assert_eq!(surface.state().loads, vec!["https://example.com/page".to_string()]);
        assert!(!surface.state().attached);

        h.pump().await;
        assert!(!h.nav.registry().get(id.as_str()).unwrap().flags.new);
        assert!(surface.state().attached);
        assert_eq!(h.nav.compositor().attached(), &[id]);
    }

    #[tokio::test]
    async fn test_create_tab_with_plain_text_loads_blank() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("reading list")).await.unwrap();
        let surface = h.factory.surface(&id).unwrap();
        assert_eq!(surface.state().loads, vec![BLANK_URL.to_string()]);
        assert_eq!(h.nav.registry().get(id.as_str()).unwrap().title, "reading list");

        h.pump().await;
        assert!(h.nav.registry().get(id.as_str()).unwrap().flags.new);
        assert!(h.nav.compositor().attached().is_empty());
    }

    #[tokio::test]
    async fn test_create_tab_surfaces_factory_failure() {
        let mut h = Harness::new();
        h.factory.set_failing(true);
        assert!(h.nav.create_tab(None).await.is_err());
        assert_eq!(h.nav.registry().len(), 1);
        assert_eq!(h.nav.registry().active_id(), Some(&TabId::home()));
    }

    #[tokio::test]
    async fn test_navigate_from_home_searches_in_new_tab() {
        let mut h = Harness::new();
        h.nav.navigate("weather today").await.unwrap();
        let id = h.nav.registry().active_id().unwrap().clone();
        let surface = h.factory.surface(&id).unwrap();
        assert_eq!(
            surface.state().loads,
            vec!["https://www.google.com/search?q=weather%20today".to_string()]
        );
    }

    #[tokio::test]
    async fn test_navigate_loads_in_place() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.pump().await;
        h.notifications();

        h.nav.navigate("rust-lang.org").await.unwrap();
        assert_eq!(h.factory.created(), 1);
        let surface = h.factory.surface(&id).unwrap();
        assert_eq!(surface.state().url, "https://rust-lang.org");
        assert!(h.notifications().contains(&ShellEvent::AddressBar {
            url: "https://rust-lang.org".to_string()
        }));
        assert!(surface.state().attached);
    }

    #[tokio::test]
    async fn test_navigated_resolves_favicon() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com/a")).await.unwrap();
        h.factory
            .surface(&id)
            .unwrap()
            .update(|s| s.eval_result = Some(json!("https://cdn.example.com/icon.png")));
        h.pump().await;
        assert_eq!(
            h.nav.registry().get(id.as_str()).unwrap().favicon.as_deref(),
            Some("https://cdn.example.com/icon.png")
        );

        let other = h.nav.create_tab(Some("https://rust-lang.org/learn")).await.unwrap();
        h.factory
            .surface(&other)
            .unwrap()
            .update(|s| s.eval_error = Some("SyntaxError".to_string()));
        h.pump().await;
        let tab = h.nav.registry().get(other.as_str()).unwrap();
        assert_eq!(tab.favicon.as_deref(), Some("https://rust-lang.org/favicon.ico"));
        assert!(!tab.flags.new);
    }

    #[tokio::test]
    async fn test_load_drops_previous_favicon() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.factory
            .surface(&id)
            .unwrap()
            .update(|s| s.eval_result = Some(json!("https://example.com/icon.png")));
        h.pump().await;
        h.notifications();

        h.nav.navigate("https://docs.rs").await.unwrap();
        assert_eq!(
            h.notifications()[0],
            ShellEvent::TabUpdated {
                tab_id: id.clone(),
                title: "docs.rs".to_string(),
                favicon: None,
            }
        );
        assert_eq!(h.nav.registry().get(id.as_str()).unwrap().favicon, None);

        h.pump().await;
        assert!(h.nav.registry().get(id.as_str()).unwrap().favicon.is_some());
    }

    #[tokio::test]
    async fn test_background_load_does_not_steal_view() {
        let mut h = Harness::new();
        let background = h.nav.create_tab(Some("https://a.example.com")).await.unwrap();
        let foreground = h.nav.create_tab(Some("https://b.example.com")).await.unwrap();
        h.notifications();
        h.pump().await;

        assert_eq!(h.nav.compositor().attached(), &[foreground.clone()]);
        assert!(!h.factory.surface(&background).unwrap().state().attached);
        let address_updates: Vec<_> = h
            .notifications()
            .into_iter()
            .filter(|e| matches!(e, ShellEvent::AddressBar { .. }))
            .collect();
        assert_eq!(
            address_updates,
            vec![ShellEvent::AddressBar {
                url: "https://b.example.com".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_close_tab_releases_surface() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.pump().await;
        let surface = h.factory.surface(&id).unwrap();

        assert!(h.nav.close_tab(id.as_str()).await);
        assert!(h.nav.registry().get(id.as_str()).is_none());
        assert!(h.nav.registry().active_id().is_none());
        assert!(h.nav.compositor().attached().is_empty());
        assert!(surface.state().closed);

        assert!(!h.nav.close_tab(id.as_str()).await);
        assert!(!h.nav.close_tab("does-not-exist").await);
    }

    #[tokio::test]
    async fn test_events_for_closed_tab_are_dropped() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.nav.close_tab(id.as_str()).await;
        h.notifications();
        h.pump().await;
        assert!(h.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_noop_on_home_and_new() {
        let mut h = Harness::new();
        h.nav.go_back().await.unwrap();
        h.nav.go_forward().await.unwrap();
        h.nav.reload().await.unwrap();

        let id = h.nav.create_tab(None).await.unwrap();
        let surface = h.factory.surface(&id).unwrap();
        h.nav.go_back().await.unwrap();
        assert_eq!(surface.state().url, BLANK_URL);
        h.nav.reload().await.unwrap();
        assert_eq!(surface.state().reloads, 0);
    }

    #[tokio::test]
    async fn test_back_and_forward_walk_history() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://one.example.com")).await.unwrap();
        h.pump().await;
        h.nav.navigate("https://two.example.com").await.unwrap();
        let surface = h.factory.surface(&id).unwrap();

        h.nav.go_back().await.unwrap();
        assert_eq!(surface.state().url, "https://one.example.com");
        h.nav.go_forward().await.unwrap();
        assert_eq!(surface.state().url, "https://two.example.com");
        h.nav.reload().await.unwrap();
        assert_eq!(surface.state().reloads, 1);
    }

    #[tokio::test]
    async fn test_switch_tab() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.pump().await;
        h.notifications();

        h.nav.switch_tab(Some("home")).await;
        assert_eq!(h.notifications(), vec![ShellEvent::AddressBar { url: String::new() }]);
        assert!(h.nav.compositor().attached().is_empty());

        h.nav.switch_tab(Some(id.as_str())).await;
        assert_eq!(
            h.notifications(),
            vec![ShellEvent::AddressBar {
                url: "https://example.com".to_string()
            }]
        );
        assert_eq!(h.nav.compositor().attached(), &[id.clone()]);

        h.nav.switch_tab(Some("bogus")).await;
        assert_eq!(h.nav.registry().active_id(), Some(&id));

        h.nav.switch_tab(None).await;
        assert!(h.nav.registry().active_id().is_none());
        assert!(h.nav.compositor().attached().is_empty());
    }

    #[tokio::test]
    async fn test_context_menu_becomes_notification() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.notifications();
        h.nav
            .handle_surface_event(SurfaceEvent::ContextMenu {
                tab_id: id.clone(),
                item: ContextMenuItem::Summarize,
                selection: "ownership rules".to_string(),
            })
            .await;
        h.nav
            .handle_surface_event(SurfaceEvent::ContextMenu {
                tab_id: id,
                item: ContextMenuItem::Explain,
                selection: "lifetimes".to_string(),
            })
            .await;
        assert_eq!(
            h.notifications(),
            vec![
                ShellEvent::ContextMenuSummarize {
                    text: "ownership rules".to_string()
                },
                ShellEvent::ContextMenuExplain {
                    text: "lifetimes".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_open_panel_hides_content() {
        let mut h = Harness::new();
        h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.pump().await;
        let panel = h.nav.open_panel(Panel::AiChat).await.unwrap();
        assert_eq!(h.nav.registry().active_id(), Some(&panel));
        assert!(h.nav.compositor().attached().is_empty());
        assert_eq!(h.nav.registry().get(panel.as_str()).unwrap().title, "AI Chat");
    }

    #[tokio::test]
    async fn test_resize_reattaches_with_new_bounds() {
        let mut h = Harness::new();
        let id = h.nav.create_tab(Some("https://example.com")).await.unwrap();
        h.pump().await;
        h.nav.resize(1400, 900).await;
        let bounds = h.factory.surface(&id).unwrap().state().bounds.unwrap();
        assert_eq!((bounds.width, bounds.height), (1400, 818));
    }
}
