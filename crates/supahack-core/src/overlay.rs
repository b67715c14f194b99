//! Overlay messaging between the background service and content scripts.

use tracing::debug;

use crate::host::{BrowserHost, CONTENT_SCRIPT, TabMessage};
use crate::types::{MessageResponse, TabId};

/// URL prefixes of pages where content scripts cannot run.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "edge://",
    "about:",
    "chrome-extension://",
    "devtools://",
];

/// Whether the overlay can never be injected into this URL.
pub fn is_restricted_url(url: &str) -> bool {
    RESTRICTED_PREFIXES.iter().any(|prefix| url.starts_with(prefix))
}

/// Open the explorer overlay on the active tab, injecting the content script
/// when it is not there yet.
pub async fn open_explorer_on_active_tab(host: &dyn BrowserHost) -> MessageResponse {
    let tab = match host.active_tab().await {
        Ok(Some(tab)) => tab,
        Ok(None) => return MessageResponse::fail("No active tab found."),
        Err(e) => return MessageResponse::fail(e.to_string()),
    };

    if tab.url.as_deref().is_some_and(is_restricted_url) {
        return MessageResponse::fail("Cannot open overlay on browser chrome pages.");
    }

    if host.send_tab_message(tab.id, TabMessage::OpenOverlay).await.is_ok() {
        return MessageResponse::ok();
    }

    debug!("No content script in tab {}, injecting {}", tab.id, CONTENT_SCRIPT);
    if let Err(e) = host.inject_script(tab.id, CONTENT_SCRIPT).await {
        return MessageResponse::fail(e.to_string());
    }

    match host.send_tab_message(tab.id, TabMessage::OpenOverlay).await {
        Ok(()) => MessageResponse::ok(),
        Err(e) => MessageResponse::fail(e.to_string()),
    }
}

/// Ask the active tab to close its overlay. Missing content scripts are fine.
pub async fn close_overlay_on_active_tab(host: &dyn BrowserHost) {
    if let Ok(Some(tab)) = host.active_tab().await {
        notify_tab(host, tab.id, TabMessage::CloseOverlay).await;
    }
}

/// Best-effort message to a tab; failures are logged and dropped.
pub async fn notify_tab(host: &dyn BrowserHost, tab_id: TabId, message: TabMessage) {
    if let Err(e) = host.send_tab_message(tab_id, message).await {
        debug!("Tab {} did not take {:?}: {}", tab_id, message, e);
    }
}
