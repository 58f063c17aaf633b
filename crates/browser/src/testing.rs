//! In-memory surfaces for exercising the shell without a browser.

use async_trait::async_trait;
use sentoogle_core::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::registry::TabId;
use crate::surface::{Bounds, RenderSurface, SurfaceEvent, SurfaceEventSender, SurfaceFactory};

#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub url: String,
    pub history: Vec<String>,
    pub history_index: usize,
    pub loads: Vec<String>,
    pub reloads: usize,
    pub attached: bool,
    pub bounds: Option<Bounds>,
    pub zoom_resets: usize,
    pub closed: bool,
    /// Selectors that resolve to an element.
    pub elements: HashSet<String>,
    /// Selectors whose click or value assignment throws.
    pub broken: HashSet<String>,
    pub clicks: Vec<String>,
    pub values: HashMap<String, String>,
    pub evaluated: Vec<String>,
    pub eval_result: Option<Value>,
    pub eval_error: Option<String>,
    pub fail_loads: bool,
}

#[derive(Clone, Default)]
pub struct FakeSurface {
    tab_id: Option<TabId>,
    state: Arc<Mutex<PageState>>,
    events: Option<SurfaceEventSender>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed() -> Box<dyn RenderSurface> {
        Box::new(Self::new())
    }

    /// Snapshot of the page state.
    pub fn state(&self) -> PageState {
        self.state.lock().expect("fake surface state poisoned").clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut PageState)) {
        f(&mut self.state.lock().expect("fake surface state poisoned"));
    }

    fn emit_navigated(&self, url: &str) {
        if let (Some(tab_id), Some(events)) = (&self.tab_id, &self.events) {
            let _ = events.send(SurfaceEvent::Navigated {
                tab_id: tab_id.clone(),
                url: url.to_string(),
            });
        }
    }

    fn step_history(&self, delta: isize) {
        let url = {
            let mut state = self.state.lock().expect("fake surface state poisoned");
            let target = state.history_index as isize + delta;
            if target < 0 || target as usize >= state.history.len() {
                return;
            }
            state.history_index = target as usize;
            state.url = state.history[state.history_index].clone();
            state.url.clone()
        };
        self.emit_navigated(&url);
    }
}

#[async_trait]
impl RenderSurface for FakeSurface {
    async fn load_url(&self, url: &str) -> Result<()> {
        {
            let mut state = self.state.lock().expect("fake surface state poisoned");
            if state.fail_loads {
                return Err(Error::Surface(format!("Failed to load {}: net::ERR_FAILED", url)));
            }
            state.loads.push(url.to_string());
            if !state.history.is_empty() {
                let keep = state.history_index + 1;
                state.history.truncate(keep);
            }
            state.history.push(url.to_string());
            state.history_index = state.history.len() - 1;
            state.url = url.to_string();
        }
        self.emit_navigated(url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().url)
    }

    async fn go_back(&self) -> Result<()> {
        self.step_history(-1);
        Ok(())
    }

    async fn go_forward(&self) -> Result<()> {
        self.step_history(1);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.update(|s| s.reloads += 1);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut state = self.state.lock().expect("fake surface state poisoned");
        state.evaluated.push(script.to_string());
        if let Some(err) = &state.eval_error {
            return Err(Error::Surface(err.clone()));
        }
        Ok(state.eval_result.clone().unwrap_or(Value::Null))
    }

    async fn attach(&self, bounds: Bounds) -> Result<()> {
        self.update(|s| {
            s.attached = true;
            s.bounds = Some(bounds);
        });
        Ok(())
    }

    async fn detach(&self) -> Result<()> {
        self.update(|s| s.attached = false);
        Ok(())
    }

    async fn reset_zoom(&self) -> Result<()> {
        self.update(|s| s.zoom_resets += 1);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.update(|s| {
            s.closed = true;
            s.attached = false;
        });
        Ok(())
    }

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        Ok(self.state().elements.contains(selector))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.state.lock().expect("fake surface state poisoned");
        if state.broken.contains(selector) {
            return Err(Error::Surface(format!("click on {} threw", selector)));
        }
        state.clicks.push(selector.to_string());
        Ok(())
    }

    async fn set_value(&self, selector: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock().expect("fake surface state poisoned");
        if state.broken.contains(selector) {
            return Err(Error::Surface(format!("value assignment on {} threw", selector)));
        }
        state.values.insert(selector.to_string(), text.to_string());
        Ok(())
    }
}

/// Hands out [`FakeSurface`]s and keeps a handle to each for inspection.
#[derive(Clone, Default)]
pub struct FakeSurfaceFactory {
    surfaces: Arc<Mutex<Vec<(TabId, FakeSurface)>>>,
    elements: Arc<Mutex<HashSet<String>>>,
    failing: Arc<AtomicBool>,
}

impl FakeSurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every page created from now on contains these selectors.
    pub fn with_elements(self, selectors: &[&str]) -> Self {
        self.elements
            .lock()
            .expect("fake factory poisoned")
            .extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn surface(&self, tab_id: &TabId) -> Option<FakeSurface> {
        self.surfaces
            .lock()
            .expect("fake factory poisoned")
            .iter()
            .find(|(id, _)| id == tab_id)
            .map(|(_, s)| s.clone())
    }

    pub fn created(&self) -> usize {
        self.surfaces.lock().expect("fake factory poisoned").len()
    }
}

#[async_trait]
impl SurfaceFactory for FakeSurfaceFactory {
    async fn create_surface(
        &self,
        tab_id: &TabId,
        events: SurfaceEventSender,
    ) -> Result<Box<dyn RenderSurface>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Surface("renderer unavailable".to_string()));
        }
        let surface = FakeSurface {
            tab_id: Some(tab_id.clone()),
            state: Arc::new(Mutex::new(PageState {
                elements: self.elements.lock().expect("fake factory poisoned").clone(),
                ..PageState::default()
            })),
            events: Some(events),
        };
        self.surfaces
            .lock()
            .expect("fake factory poisoned")
            .push((tab_id.clone(), surface.clone()));
        Ok(Box::new(surface))
    }
}
