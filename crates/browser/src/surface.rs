//! The rendering-surface seam: one isolated web renderer per content tab.

use async_trait::async_trait;
use sentoogle_core::Result;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::registry::TabId;

/// Placeholder page loaded into tabs that have no real destination yet.
pub const BLANK_URL: &str = "about:blank";

/// Window-relative rectangle a surface occupies when attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Items offered by the in-page context menu on selected text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMenuItem {
    Summarize,
    Explain,
}

impl ContextMenuItem {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summarize" => Some(Self::Summarize),
            "explain" => Some(Self::Explain),
            _ => None,
        }
    }
}

/// Events a surface emits on its own; consumed by the navigation controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Navigated {
        tab_id: TabId,
        url: String,
    },
    ContextMenu {
        tab_id: TabId,
        item: ContextMenuItem,
        selection: String,
    },
}

impl SurfaceEvent {
    pub fn tab_id(&self) -> &TabId {
        match self {
            SurfaceEvent::Navigated { tab_id, .. } | SurfaceEvent::ContextMenu { tab_id, .. } => tab_id,
        }
    }
}

pub type SurfaceEventSender = mpsc::UnboundedSender<SurfaceEvent>;
pub type SurfaceEventReceiver = mpsc::UnboundedReceiver<SurfaceEvent>;

/// JSON string literal for embedding untrusted text in a page script.
pub fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Load `url` and wait for the page to finish loading.
    async fn load_url(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn go_back(&self) -> Result<()>;

    async fn go_forward(&self) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Make the surface visible in the content region at `bounds`.
    async fn attach(&self, bounds: Bounds) -> Result<()>;

    async fn detach(&self) -> Result<()>;

    /// Undo page-initiated zoom so every tab shows at 100%.
    async fn reset_zoom(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) {{ throw new Error('Element not found'); }} el.click(); return true; }})()",
            js_string(selector)
        );
        self.evaluate(&script).await.map(|_| ())
    }

    async fn set_value(&self, selector: &str, text: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) {{ throw new Error('Element not found'); }} el.value = {}; el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true; }})()",
            js_string(selector),
            js_string(text)
        );
        self.evaluate(&script).await.map(|_| ())
    }
}

/// Creates surfaces. Implementations must register the surface's
/// navigation and context-menu hooks on `events` before returning.
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    async fn create_surface(
        &self,
        tab_id: &TabId,
        events: SurfaceEventSender,
    ) -> Result<Box<dyn RenderSurface>>;
}
