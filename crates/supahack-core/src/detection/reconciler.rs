//! Connection reconciliation.
//!
//! Decides whether freshly observed credentials should replace the persisted
//! connection, and undoes detector-owned connections when their tab goes
//! away. The in-memory state (cache, throttle) is owned by the caller and
//! handed in through [`DetectionContext`].

use tracing::{debug, info};

use super::cache::{cache_key, DetectionCache, DetectionCacheEntry};
use super::throttle::PanelOpenThrottle;
use crate::clock::Clock;
use crate::credentials::{determine_project_id, normalize_schema, sanitize_api_key, url_host};
use crate::error::Result;
use crate::host::{BrowserHost, TabMessage};
use crate::overlay::notify_tab;
use crate::store::{ConnectionStoreExt, KeyValueStore};
use crate::types::{mask_secret, Connection, ConnectionMeta, MetaSource, TabId};

/// Everything reconciliation reads or writes.
#[derive(Clone, Copy)]
pub struct DetectionContext<'a> {
    pub store: &'a dyn KeyValueStore,
    pub host: &'a dyn BrowserHost,
    pub clock: &'a dyn Clock,
    pub cache: &'a DetectionCache,
    pub throttle: &'a PanelOpenThrottle,
}

/// Credentials observed on the wire or reported by the page detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionEvent {
    pub tab_id: Option<TabId>,
    /// Request URL.
    pub url: String,
    /// Raw `apikey` (or `authorization`) header value.
    pub api_key: String,
    pub schema: Option<String>,
    /// URL of the page that issued the request, when known.
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingApiKey,
    UnresolvedProject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing usable in the event.
    Skipped(SkipReason),
    /// Same credentials as the last event for this tab.
    Duplicate,
    /// Store already held these credentials; only the meta was refreshed.
    MetaRefreshed,
    /// Store already held these credentials under a DevTools or side panel
    /// write, which detection never takes over.
    Retained,
    /// Connection and meta were written.
    Updated { project_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The persisted connection belongs to another tab or source.
    NotOwner,
    /// Connection was already absent; meta stamped as cleared.
    AlreadyCleared,
    /// Connection nulled and meta stamped.
    Cleared,
}

impl<'a> DetectionContext<'a> {
    fn meta(&self, source: MetaSource, tab_id: Option<TabId>) -> ConnectionMeta {
        ConnectionMeta {
            source,
            updated_at: self.clock.now_millis(),
            tab_id,
            cleared: None,
        }
    }
}

/// Reconcile one detection event against the cache and the store.
pub async fn reconcile_detection(
    ctx: DetectionContext<'_>,
    event: &DetectionEvent,
) -> Result<ReconcileOutcome> {
    let Some(api_key) = sanitize_api_key(&event.api_key) else {
        return Ok(ReconcileOutcome::Skipped(SkipReason::MissingApiKey));
    };

    let Some(project_id) = determine_project_id(&event.url, &api_key) else {
        debug!("No project id derivable from {}", event.url);
        return Ok(ReconcileOutcome::Skipped(SkipReason::UnresolvedProject));
    };

    let schema = normalize_schema(event.schema.as_deref());
    let tab_id = event.tab_id.filter(|id| *id >= 0);
    let key = cache_key(tab_id);

    if ctx.cache.is_duplicate(&key, &project_id, &api_key, &schema) {
        return Ok(ReconcileOutcome::Duplicate);
    }

    ctx.cache.insert(
        key,
        DetectionCacheEntry {
            project_id: project_id.clone(),
            api_key: api_key.clone(),
            schema: schema.clone(),
            timestamp: ctx.clock.now_millis(),
            page_host: event.page_url.as_deref().and_then(url_host),
            target_host: url_host(&event.url),
        },
    );

    let existing = ctx.store.load_connection().await?;
    let unchanged = existing
        .as_ref()
        .is_some_and(|c| c.matches(&project_id, &api_key, &schema));

    if let Some(id) = tab_id {
        notify_tab(ctx.host, id, TabMessage::ShowOverlayBubble).await;
    }

    let meta = ctx.meta(MetaSource::Detector, tab_id);
    if unchanged {
        let current = ctx.store.load_meta().await?;
        if current.is_some_and(|m| m.source != MetaSource::Detector) {
            return Ok(ReconcileOutcome::Retained);
        }
        ctx.store.save_meta(&meta).await?;
        return Ok(ReconcileOutcome::MetaRefreshed);
    }

    let connection = Connection {
        project_id: project_id.clone(),
        schema,
        bearer: api_key.clone(),
        api_key,
    };
    ctx.store.save_connection(Some(&connection), &meta).await?;
    info!(
        "Detected Supabase project {} (key {}) on {}",
        project_id,
        mask_secret(&connection.api_key),
        tab_id.map(|id| format!("tab {}", id)).unwrap_or_else(|| "unknown tab".into())
    );

    if let Some(id) = tab_id {
        let _ = ctx
            .throttle
            .open_side_panel_for_tab(ctx.host, ctx.clock, id, false)
            .await;
    }

    Ok(ReconcileOutcome::Updated { project_id })
}

/// Forget a tab's detection and, when the persisted connection was written by
/// the detector for that same tab, clear it.
pub async fn clear_tab_detection(ctx: DetectionContext<'_>, tab_id: TabId) -> Result<ClearOutcome> {
    ctx.cache.remove(&cache_key(Some(tab_id)));
    notify_tab(ctx.host, tab_id, TabMessage::HideOverlayBubble).await;

    let meta = ctx.store.load_meta().await?;
    if !meta.as_ref().is_some_and(|m| m.is_detector_for(tab_id)) {
        return Ok(ClearOutcome::NotOwner);
    }

    let mut stamped = ctx.meta(MetaSource::Detector, Some(tab_id));
    stamped.cleared = Some(true);

    if ctx.store.load_connection().await?.is_none() {
        if let Some(mut existing) = meta {
            // Keep the original timestamp; this only marks the record
            existing.cleared = Some(true);
            ctx.store.save_meta(&existing).await?;
        }
        return Ok(ClearOutcome::AlreadyCleared);
    }

    ctx.store.save_connection(None, &stamped).await?;
    info!("Cleared detected connection for closed or navigated tab {}", tab_id);
    Ok(ClearOutcome::Cleared)
}

/// Clear the tab's detection when it navigated to a different host than the
/// one detection happened on.
///
/// Without a recorded page host the Supabase host stands in, so any
/// navigation to another site counts as leaving.
pub async fn handle_tab_navigation(
    ctx: DetectionContext<'_>,
    tab_id: TabId,
    new_url: &str,
) -> Result<Option<ClearOutcome>> {
    let Some(entry) = ctx.cache.get(&cache_key(Some(tab_id))) else {
        return Ok(None);
    };
    let Some(known_host) = entry.page_host.or(entry.target_host) else {
        return Ok(None);
    };
    if url_host(new_url).as_deref() == Some(known_host.as_str()) {
        return Ok(None);
    }

    debug!("Tab {} left {} for {}", tab_id, known_host, new_url);
    clear_tab_detection(ctx, tab_id).await.map(Some)
}
