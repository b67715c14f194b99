//! Background service.
//!
//! Owns the detection cache and panel throttle, and turns browser events
//! (sniffed request headers, tab updates and removals, toolbar clicks) and
//! runtime messages into reconciler, overlay and store calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::credentials::{is_supabase_url, sanitize_api_key};
use crate::detection::{
    clear_tab_detection, handle_tab_navigation, reconcile_detection, ClearOutcome, DetectionCache,
    DetectionContext, DetectionEvent, PanelOpenOutcome, PanelOpenThrottle, ReconcileOutcome,
};
use crate::devtools::{normalize_headers, CapturedRequest, HeaderEntry};
use crate::error::{Error, Result};
use crate::host::{BrowserHost, TabInfo};
use crate::overlay::{close_overlay_on_active_tab, open_explorer_on_active_tab};
use crate::store::{ConnectionStoreExt, KeyValueStore};
use crate::types::{mask_secret, Connection, ConnectionMeta, MessageResponse, MetaSource, TabId};

/// Messages other extension components send to the background service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuntimeMessage {
    OpenExplorer,
    CloseOverlay,
    ApplyConnection(Connection),
    #[serde(rename_all = "camelCase")]
    OpenSidePanel {
        #[serde(default)]
        tab_id: Option<TabId>,
    },
    #[serde(rename_all = "camelCase")]
    SupabaseRequestDetected {
        url: String,
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        schema: Option<String>,
    },
    CapturedRequest(CapturedRequest),
}

/// Sending side of the runtime message channel.
#[async_trait]
pub trait BackgroundPort: Send + Sync {
    async fn send(&self, message: RuntimeMessage) -> MessageResponse;
}

/// The extension's background service.
pub struct Background {
    store: Arc<dyn KeyValueStore>,
    host: Arc<dyn BrowserHost>,
    clock: Arc<dyn Clock>,
    cache: DetectionCache,
    throttle: PanelOpenThrottle,
}

impl Background {
    pub fn new(store: Arc<dyn KeyValueStore>, host: Arc<dyn BrowserHost>) -> Self {
        Self::with_clock(store, host, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        host: Arc<dyn BrowserHost>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            host,
            clock,
            cache: DetectionCache::new(),
            throttle: PanelOpenThrottle::default(),
        }
    }

    /// Replace the panel throttle (tests and custom cooldowns).
    pub fn with_throttle(mut self, throttle: PanelOpenThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    fn ctx(&self) -> DetectionContext<'_> {
        DetectionContext {
            store: self.store.as_ref(),
            host: self.host.as_ref(),
            clock: self.clock.as_ref(),
            cache: &self.cache,
            throttle: &self.throttle,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn cache(&self) -> &DetectionCache {
        &self.cache
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Runtime Messages
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle one runtime message. Errors become `{ok: false, reason}`.
    pub async fn handle_message(&self, message: RuntimeMessage, sender: Option<&TabInfo>) -> MessageResponse {
        debug!("Runtime message {:?}", message_kind(&message));
        let result = match message {
            RuntimeMessage::OpenExplorer => return open_explorer_on_active_tab(self.host.as_ref()).await,
            RuntimeMessage::CloseOverlay => {
                close_overlay_on_active_tab(self.host.as_ref()).await;
                return MessageResponse::ok();
            }
            RuntimeMessage::ApplyConnection(connection) => self.apply_connection(&connection).await,
            RuntimeMessage::OpenSidePanel { tab_id } => {
                return self.open_side_panel(tab_id.or(sender.map(|t| t.id))).await;
            }
            RuntimeMessage::SupabaseRequestDetected { url, api_key, schema } => {
                let event = DetectionEvent {
                    tab_id: sender.map(|t| t.id),
                    url,
                    api_key,
                    schema,
                    page_url: sender.and_then(|t| t.url.clone()),
                };
                reconcile_detection(self.ctx(), &event).await.map(|_| ())
            }
            RuntimeMessage::CapturedRequest(request) => self.apply_captured_request(&request).await,
        };

        match result {
            Ok(()) => MessageResponse::ok(),
            Err(e) => {
                warn!("Runtime message failed: {}", e);
                MessageResponse::fail(e.to_string())
            }
        }
    }

    /// Persist a connection entered by hand.
    async fn apply_connection(&self, connection: &Connection) -> Result<()> {
        let connection = connection.normalized();
        if !connection.is_usable() {
            return Err(Error::MissingCredentials);
        }
        let meta = ConnectionMeta {
            source: MetaSource::Sidepanel,
            updated_at: self.clock.now_millis(),
            tab_id: None,
            cleared: None,
        };
        self.store.save_connection(Some(&connection), &meta).await
    }

    /// Persist the credentials of a request picked in the DevTools panel and
    /// bring up the side panel for its tab.
    pub async fn apply_captured_request(&self, request: &CapturedRequest) -> Result<()> {
        let connection = request.to_connection()?;
        let meta = ConnectionMeta {
            source: MetaSource::Devtools,
            updated_at: self.clock.now_millis(),
            tab_id: request.tab_id,
            cleared: None,
        };
        self.store.save_connection(Some(&connection), &meta).await?;
        info!(
            "Applied captured request for project {} (key {})",
            connection.project_id,
            mask_secret(&connection.api_key)
        );

        if let Some(tab_id) = request.tab_id.filter(|id| *id >= 0) {
            let _ = self
                .throttle
                .open_side_panel_for_tab(self.host.as_ref(), self.clock.as_ref(), tab_id, true)
                .await;
        }
        Ok(())
    }

    async fn open_side_panel(&self, tab_id: Option<TabId>) -> MessageResponse {
        let tab_id = match tab_id {
            Some(id) => id,
            None => match self.host.active_tab().await {
                Ok(Some(tab)) => tab.id,
                Ok(None) => return MessageResponse::fail("No active tab found."),
                Err(e) => return MessageResponse::fail(e.to_string()),
            },
        };
        match self
            .throttle
            .open_side_panel_for_tab(self.host.as_ref(), self.clock.as_ref(), tab_id, true)
            .await
        {
            PanelOpenOutcome::Failed(reason) => MessageResponse::fail(reason),
            PanelOpenOutcome::Opened | PanelOpenOutcome::Throttled => MessageResponse::ok(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Browser Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Outgoing request headers, observed without modification.
    ///
    /// `initiator` is the origin of the page that issued the request.
    pub async fn on_before_send_headers(
        &self,
        tab_id: Option<TabId>,
        url: &str,
        headers: &[HeaderEntry],
        initiator: Option<&str>,
    ) -> Result<Option<ReconcileOutcome>> {
        if !is_supabase_url(url) {
            return Ok(None);
        }

        let headers = normalize_headers(headers).map;
        let api_key = ["apikey", "authorization"]
            .iter()
            .filter_map(|name| headers.get(*name))
            .find(|value| sanitize_api_key(value).is_some());
        let Some(api_key) = api_key else {
            return Ok(None);
        };
        let schema = ["accept-profile", "content-profile"]
            .iter()
            .find_map(|name| headers.get(*name))
            .cloned();

        let event = DetectionEvent {
            tab_id,
            url: url.to_string(),
            api_key: api_key.clone(),
            schema,
            page_url: initiator.map(str::to_string),
        };
        reconcile_detection(self.ctx(), &event).await.map(Some)
    }

    /// A tab's URL changed.
    pub async fn on_tab_updated(&self, tab_id: TabId, url: Option<&str>) -> Result<Option<ClearOutcome>> {
        match url {
            Some(url) => handle_tab_navigation(self.ctx(), tab_id, url).await,
            None => Ok(None),
        }
    }

    /// A tab was closed.
    pub async fn on_tab_removed(&self, tab_id: TabId) -> Result<ClearOutcome> {
        self.throttle.forget(tab_id);
        clear_tab_detection(self.ctx(), tab_id).await
    }

    /// Toolbar button clicked on a tab.
    pub async fn on_action_clicked(&self, tab: &TabInfo) -> PanelOpenOutcome {
        self.throttle
            .open_side_panel_for_tab(self.host.as_ref(), self.clock.as_ref(), tab.id, true)
            .await
    }
}

#[async_trait]
impl BackgroundPort for Background {
    async fn send(&self, message: RuntimeMessage) -> MessageResponse {
        self.handle_message(message, None).await
    }
}

fn message_kind(message: &RuntimeMessage) -> &'static str {
    match message {
        RuntimeMessage::OpenExplorer => "open-explorer",
        RuntimeMessage::CloseOverlay => "close-overlay",
        RuntimeMessage::ApplyConnection(_) => "apply-connection",
        RuntimeMessage::OpenSidePanel { .. } => "open-side-panel",
        RuntimeMessage::SupabaseRequestDetected { .. } => "supabase-request-detected",
        RuntimeMessage::CapturedRequest(_) => "captured-request",
    }
}
