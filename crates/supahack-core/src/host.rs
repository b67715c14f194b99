//! Browser host abstraction.
//!
//! Everything the background service needs from the browser (tabs, content
//! scripts, the side panel) goes through [`BrowserHost`]. The extension
//! binding implements it over the real APIs; tests use recording fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::TabId;

/// Page used for the side panel.
pub const SIDE_PANEL_PATH: &str = "sidepanel.html";

/// Content script injected on demand.
pub const CONTENT_SCRIPT: &str = "content.js";

/// A browser tab as seen by the background service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default)]
    pub url: Option<String>,
}

/// Messages sent from the background to a tab's content script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TabMessage {
    OpenOverlay,
    CloseOverlay,
    ShowOverlayBubble,
    HideOverlayBubble,
}

/// Browser operations used by the background service.
///
/// Errors carry the host's own message (the equivalent of
/// `runtime.lastError`).
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Active tab of the current window.
    async fn active_tab(&self) -> Result<Option<TabInfo>>;

    /// Deliver a message to the tab's content script.
    async fn send_tab_message(&self, tab_id: TabId, message: TabMessage) -> Result<()>;

    /// Inject a script file into the tab.
    async fn inject_script(&self, tab_id: TabId, file: &str) -> Result<()>;

    /// Point the tab's side panel at a page.
    async fn set_side_panel_options(&self, tab_id: TabId, path: &str) -> Result<()>;

    /// Open the side panel for a tab.
    async fn open_side_panel(&self, tab_id: TabId) -> Result<()>;
}
