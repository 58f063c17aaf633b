//! Notifications from the core to the chrome layer.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::registry::TabId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ShellEvent {
    TabCreated {
        tab_id: TabId,
        title: String,
    },
    TabUpdated {
        tab_id: TabId,
        title: String,
        favicon: Option<String>,
    },
    AddressBar {
        url: String,
    },
    ContextMenuSummarize {
        text: String,
    },
    ContextMenuExplain {
        text: String,
    },
}

/// Fire-and-forget sender; order is preserved, a missing listener is not an error.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<ShellEvent>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ShellEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: ShellEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!(event = ?e.0, "No chrome listener for notification");
        }
    }
}
