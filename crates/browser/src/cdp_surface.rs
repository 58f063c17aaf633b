//! Rendering surface backed by one Chrome page target in its own window.

use async_trait::async_trait;
use sentoogle_core::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cdp::CdpClient;
use crate::registry::TabId;
use crate::surface::{Bounds, ContextMenuItem, RenderSurface, SurfaceEvent, SurfaceEventSender};

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const CONTEXT_MENU_BINDING: &str = "__sentoogleContextMenu";

/// Installed on every document: right-click on selected text shows a two-item
/// menu whose choice is reported through the binding.
pub(crate) const CONTEXT_MENU_SCRIPT: &str = r#"
(() => {
  const BINDING = '__sentoogleContextMenu';
  let menu = null;
  const dismiss = () => { if (menu) { menu.remove(); menu = null; } };
  document.addEventListener('mousedown', (e) => { if (menu && !menu.contains(e.target)) dismiss(); }, true);
  document.addEventListener('contextmenu', (e) => {
    const text = String(window.getSelection() || '').trim();
    if (!text || typeof window[BINDING] !== 'function') return;
    e.preventDefault();
    dismiss();
    menu = document.createElement('div');
    menu.style.cssText = 'position:fixed;z-index:2147483647;background:#fff;border:1px solid #999;border-radius:4px;font:13px sans-serif;box-shadow:0 2px 8px rgba(0,0,0,.2);';
    menu.style.left = e.clientX + 'px';
    menu.style.top = e.clientY + 'px';
    [['summarize', 'Summarize'], ['explain', 'Tell me more']].forEach(([item, label]) => {
      const entry = document.createElement('div');
      entry.textContent = label;
      entry.style.cssText = 'padding:6px 14px;cursor:pointer;';
      entry.addEventListener('click', () => {
        window[BINDING](JSON.stringify({ item, text }));
        dismiss();
      });
      menu.appendChild(entry);
    });
    document.documentElement.appendChild(menu);
  }, true);
})();
"#;

pub struct CdpSurface {
    tab_id: TabId,
    target_id: String,
    window_id: Option<i64>,
    page: CdpClient,
    browser: Arc<CdpClient>,
    forwarder: JoinHandle<()>,
}

impl CdpSurface {
    /// Connect to an already created page target and wire its hooks.
    pub(crate) async fn attach_to_target(
        tab_id: &TabId,
        target_id: String,
        page_ws_url: &str,
        browser: Arc<CdpClient>,
        events: SurfaceEventSender,
    ) -> Result<Self> {
        let page = CdpClient::connect(page_ws_url).await?;
        page.enable_domain("Page").await?;
        page.enable_domain("Runtime").await?;

        // Subscribe before anything can navigate the page.
        let navigated = page.subscribe_event("Page.frameNavigated").await;
        let binding_calls = page.subscribe_event("Runtime.bindingCalled").await;

        page.send_command("Runtime.addBinding", json!({ "name": CONTEXT_MENU_BINDING }))
            .await?;
        page.send_command(
            "Page.addScriptToEvaluateOnNewDocument",
            json!({ "source": CONTEXT_MENU_SCRIPT }),
        )
        .await?;

        let window_id = match browser
            .send_command("Browser.getWindowForTarget", json!({ "targetId": target_id }))
            .await
        {
            Ok(v) => v.get("windowId").and_then(|w| w.as_i64()),
            Err(e) => {
                debug!(tab = %tab_id, error = %e, "No window for target (headless?)");
                None
            }
        };

        let forwarder = tokio::spawn(forward_events(tab_id.clone(), navigated, binding_calls, events));

        Ok(Self {
            tab_id: tab_id.clone(),
            target_id,
            window_id,
            page,
            browser,
            forwarder,
        })
    }

    async fn set_window_bounds(&self, bounds: Value) -> Result<()> {
        let Some(window_id) = self.window_id else {
            return Ok(());
        };
        self.browser
            .send_command(
                "Browser.setWindowBounds",
                json!({ "windowId": window_id, "bounds": bounds }),
            )
            .await?;
        Ok(())
    }

    async fn step_history(&self, delta: i64) -> Result<()> {
        let history = self.page.send_command("Page.getNavigationHistory", json!({})).await?;
        let current = history.get("currentIndex").and_then(|v| v.as_i64()).unwrap_or(0);
        let entries = history
            .get("entries")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let target = current + delta;
        if target < 0 || target as usize >= entries.len() {
            debug!(tab = %self.tab_id, delta, "No history entry in that direction");
            return Ok(());
        }
        let Some(entry_id) = entries[target as usize].get("id").and_then(|v| v.as_i64()) else {
            return Ok(());
        };
        self.page
            .send_command("Page.navigateToHistoryEntry", json!({ "entryId": entry_id }))
            .await?;
        Ok(())
    }
}

async fn forward_events(
    tab_id: TabId,
    mut navigated: tokio::sync::mpsc::Receiver<Value>,
    mut binding_calls: tokio::sync::mpsc::Receiver<Value>,
    events: SurfaceEventSender,
) {
    loop {
        let event = tokio::select! {
            Some(params) = navigated.recv() => navigation_event(&tab_id, &params),
            Some(params) = binding_calls.recv() => context_menu_event(&tab_id, &params),
            else => break,
        };
        if let Some(event) = event {
            if events.send(event).is_err() {
                break;
            }
        }
    }
}

fn navigation_event(tab_id: &TabId, params: &Value) -> Option<SurfaceEvent> {
    let frame = params.get("frame")?;
    if frame.get("parentId").is_some() {
        return None;
    }
    let url = frame.get("url")?.as_str()?.to_string();
    Some(SurfaceEvent::Navigated {
        tab_id: tab_id.clone(),
        url,
    })
}

fn context_menu_event(tab_id: &TabId, params: &Value) -> Option<SurfaceEvent> {
    if params.get("name")?.as_str()? != CONTEXT_MENU_BINDING {
        return None;
    }
    let payload: Value = serde_json::from_str(params.get("payload")?.as_str()?).ok()?;
    let item = ContextMenuItem::parse(payload.get("item")?.as_str()?)?;
    let selection = payload.get("text")?.as_str()?.trim().to_string();
    if selection.is_empty() {
        return None;
    }
    Some(SurfaceEvent::ContextMenu {
        tab_id: tab_id.clone(),
        item,
        selection,
    })
}

#[async_trait]
impl RenderSurface for CdpSurface {
    async fn load_url(&self, url: &str) -> Result<()> {
        let mut loaded = self.page.subscribe_event("Page.loadEventFired").await;
        let result = self.page.send_command("Page.navigate", json!({ "url": url })).await?;
        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            if !error_text.is_empty() {
                return Err(Error::Surface(format!("Failed to load {}: {}", url, error_text)));
            }
        }
        if tokio::time::timeout(LOAD_TIMEOUT, loaded.recv()).await.is_err() {
            warn!(tab = %self.tab_id, url = %url, "Load event not seen within timeout, continuing");
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let info = self
            .browser
            .send_command("Target.getTargetInfo", json!({ "targetId": self.target_id }))
            .await?;
        Ok(info
            .get("targetInfo")
            .and_then(|t| t.get("url"))
            .and_then(|u| u.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn go_back(&self) -> Result<()> {
        self.step_history(-1).await
    }

    async fn go_forward(&self) -> Result<()> {
        self.step_history(1).await
    }

    async fn reload(&self) -> Result<()> {
        self.page.send_command("Page.reload", json!({})).await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.page.evaluate_js(script).await
    }

    async fn attach(&self, bounds: Bounds) -> Result<()> {
        // Chrome rejects a state change combined with a geometry change.
        self.set_window_bounds(json!({ "windowState": "normal" })).await?;
        self.set_window_bounds(json!({
            "left": bounds.x,
            "top": bounds.y,
            "width": bounds.width,
            "height": bounds.height,
        }))
        .await?;
        self.browser
            .send_command("Target.activateTarget", json!({ "targetId": self.target_id }))
            .await?;
        Ok(())
    }

    async fn detach(&self) -> Result<()> {
        self.set_window_bounds(json!({ "windowState": "minimized" })).await
    }

    async fn reset_zoom(&self) -> Result<()> {
        self.page
            .send_command("Emulation.setPageScaleFactor", json!({ "pageScaleFactor": 1.0 }))
            .await?;
        self.page
            .evaluate_js("if (document.body) { document.body.style.zoom = '100%'; document.body.style.transform = ''; }")
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.forwarder.abort();
        self.browser
            .send_command("Target.closeTarget", json!({ "targetId": self.target_id }))
            .await?;
        Ok(())
    }
}

impl Drop for CdpSurface {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
