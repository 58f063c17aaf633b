use sentoogle_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use crate::context::ConversationContext;
use crate::surface::RenderSurface;

pub const HOME_TAB_ID: &str = "home";
pub const NEW_TAB_TITLE: &str = "New Tab";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn home() -> Self {
        Self(HOME_TAB_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TabId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for TabId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tab views the chrome layer renders itself instead of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    AiChat,
    Settings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabFlags {
    pub home: bool,
    /// Cleared once real content has loaded.
    pub new: bool,
    pub ai_chat: bool,
    pub settings: bool,
}

pub struct Tab {
    id: TabId,
    pub flags: TabFlags,
    surface: Option<Box<dyn RenderSurface>>,
    pub context: Option<ConversationContext>,
    pub title: String,
    pub favicon: Option<String>,
}

impl Tab {
    pub fn id(&self) -> &TabId {
        &self.id
    }

    pub fn surface(&self) -> Option<&dyn RenderSurface> {
        self.surface.as_deref()
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// A tab whose surface shows real page content.
    pub fn is_web_content(&self) -> bool {
        self.surface.is_some()
            && !self.flags.home
            && !self.flags.new
            && !self.flags.ai_chat
            && !self.flags.settings
    }

    /// Surface handle plus context, handed back when the tab is removed.
    pub fn into_parts(self) -> (Option<Box<dyn RenderSurface>>, Option<ConversationContext>) {
        (self.surface, self.context)
    }
}

impl fmt::Debug for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tab")
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("has_surface", &self.surface.is_some())
            .field("context_len", &self.context.as_ref().map(|c| c.len()))
            .field("title", &self.title)
            .finish()
    }
}

/// Owns every tab and the single active-tab pointer.
#[derive(Debug)]
pub struct ViewRegistry {
    tabs: HashMap<TabId, Tab>,
    order: Vec<TabId>,
    active: Option<TabId>,
    last_issued: u64,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRegistry {
    /// A registry holding only the home tab, which is active.
    pub fn new() -> Self {
        let home = TabId::home();
        let mut tabs = HashMap::new();
        tabs.insert(
            home.clone(),
            Tab {
                id: home.clone(),
                flags: TabFlags {
                    home: true,
                    ..TabFlags::default()
                },
                surface: None,
                context: None,
                title: "Home".to_string(),
                favicon: None,
            },
        );
        Self {
            tabs,
            order: vec![home.clone()],
            active: Some(home),
            last_issued: 0,
        }
    }

    /// Timestamp-derived id, strictly greater than any issued before.
    pub fn next_tab_id(&mut self) -> TabId {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let next = now.max(self.last_issued + 1);
        self.last_issued = next;
        TabId(next.to_string())
    }

    /// Register a content tab that owns `surface`. Starts flagged as new.
    pub fn create(&mut self, id: TabId, surface: Box<dyn RenderSurface>, title: &str) -> Result<&mut Tab> {
        self.insert(
            id,
            TabFlags {
                new: true,
                ..TabFlags::default()
            },
            Some(surface),
            title,
        )
    }

    pub fn insert_panel(&mut self, id: TabId, panel: Panel) -> Result<&mut Tab> {
        let (flags, title) = match panel {
            Panel::AiChat => (
                TabFlags {
                    ai_chat: true,
                    ..TabFlags::default()
                },
                "AI Chat",
            ),
            Panel::Settings => (
                TabFlags {
                    settings: true,
                    ..TabFlags::default()
                },
                "Settings",
            ),
        };
        self.insert(id, flags, None, title)
    }

    fn insert(
        &mut self,
        id: TabId,
        flags: TabFlags,
        surface: Option<Box<dyn RenderSurface>>,
        title: &str,
    ) -> Result<&mut Tab> {
        if self.tabs.contains_key(&id) {
            return Err(Error::Validation(format!("tab '{}' already exists", id)));
        }
        self.order.push(id.clone());
        let tab = Tab {
            id: id.clone(),
            flags,
            surface,
            context: None,
            title: title.to_string(),
            favicon: None,
        };
        Ok(self.tabs.entry(id).or_insert(tab))
    }

    pub fn get(&self, id: &str) -> Option<&Tab> {
        self.tabs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Tab> {
        self.tabs.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tabs.contains_key(id)
    }

    /// Remove a tab; the active pointer is cleared if it pointed here.
    pub fn remove(&mut self, id: &str) -> Option<Tab> {
        let tab = self.tabs.remove(id)?;
        self.order.retain(|t| t.as_str() != id);
        if self.active.as_ref().map(|a| a.as_str()) == Some(id) {
            self.active = None;
        }
        Some(tab)
    }

    /// Tab ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = &TabId> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn active_id(&self) -> Option<&TabId> {
        self.active.as_ref()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active.as_ref().and_then(|id| self.tabs.get(id))
    }

    /// Point at `id`, or at nothing. Unknown ids leave the pointer unchanged.
    pub fn set_active(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.active = None;
                true
            }
            Some(id) => match self.tabs.get_key_value(id) {
                Some((key, _)) => {
                    self.active = Some(key.clone());
                    true
                }
                None => false,
            },
        }
    }

    pub fn context_mut(&mut self, id: &str) -> Option<&mut ConversationContext> {
        self.tabs
            .get_mut(id)
            .map(|tab| tab.context.get_or_insert_with(ConversationContext::new))
    }
}
