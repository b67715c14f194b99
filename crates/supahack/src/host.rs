//! Browser host used when the background logic runs from the terminal.
//!
//! There is no browser: tab messages fail the way they do for a tab without
//! a content script, and side panel opens are recorded so commands can
//! report them.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

use supahack_core::host::{BrowserHost, TabInfo, TabMessage};
use supahack_core::types::TabId;
use supahack_core::{Error, Result};

const NO_BROWSER: &str = "No browser attached.";

#[derive(Debug, Default)]
pub struct HeadlessHost {
    panel_opens: Mutex<Vec<TabId>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tabs a side panel would have opened for.
    pub fn panel_opens(&self) -> Vec<TabId> {
        self.panel_opens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl BrowserHost for HeadlessHost {
    async fn active_tab(&self) -> Result<Option<TabInfo>> {
        Ok(None)
    }

    async fn send_tab_message(&self, tab_id: TabId, message: TabMessage) -> Result<()> {
        debug!("Dropping {:?} for tab {}", message, tab_id);
        Err(Error::host(NO_BROWSER))
    }

    async fn inject_script(&self, _tab_id: TabId, _file: &str) -> Result<()> {
        Err(Error::host(NO_BROWSER))
    }

    async fn set_side_panel_options(&self, _tab_id: TabId, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn open_side_panel(&self, tab_id: TabId) -> Result<()> {
        self.panel_opens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(tab_id);
        Ok(())
    }
}
