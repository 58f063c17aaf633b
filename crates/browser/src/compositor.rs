//! Decides which single surface is visible in the window's content region.

use sentoogle_core::config::WindowConfig;
use tracing::{debug, warn};

use crate::registry::{TabId, ViewRegistry};
use crate::surface::Bounds;

#[derive(Debug)]
pub struct ViewCompositor {
    window: WindowConfig,
    chrome_offset: u32,
    attached: Vec<TabId>,
}

impl ViewCompositor {
    pub fn new(window: WindowConfig, chrome_offset: u32) -> Self {
        Self {
            window,
            chrome_offset,
            attached: Vec::new(),
        }
    }

    /// Window area minus the strip reserved for the chrome.
    pub fn content_bounds(&self) -> Bounds {
        Bounds {
            x: self.window.x,
            y: self.window.y + self.chrome_offset as i32,
            width: self.window.width,
            height: self.window.height.saturating_sub(self.chrome_offset),
        }
    }

    pub fn attached(&self) -> &[TabId] {
        &self.attached
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.window.width = width;
        self.window.height = height;
    }

    /// Detach everything, then attach the active tab's surface if it shows
    /// page content. Home, new-tab, AI chat and settings views attach nothing.
    pub async fn show(&mut self, registry: &ViewRegistry, active: Option<&TabId>) {
        for id in std::mem::take(&mut self.attached) {
            // Closed tabs took their surface with them.
            let Some(surface) = registry.get(id.as_str()).and_then(|t| t.surface()) else {
                continue;
            };
            if let Err(e) = surface.detach().await {
                warn!(tab = %id, error = %e, "Failed to detach surface");
            }
        }

        let Some(tab) = active.and_then(|id| registry.get(id.as_str())) else {
            debug!("No active tab to show");
            return;
        };
        if !tab.is_web_content() {
            debug!(tab = %tab.id(), "Active tab is rendered by the chrome layer");
            return;
        }
        let Some(surface) = tab.surface() else {
            return;
        };

        let bounds = self.content_bounds();
        if let Err(e) = surface.attach(bounds).await {
            warn!(tab = %tab.id(), error = %e, "Failed to attach surface");
            return;
        }
        if let Err(e) = surface.reset_zoom().await {
            debug!(tab = %tab.id(), error = %e, "Failed to reset zoom");
        }
        self.attached.push(tab.id().clone());
    }
}
