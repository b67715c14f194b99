//! Side panel controller.
//!
//! Headless model of the side panel: it mirrors the persisted connection,
//! fetches the table list and row counts over REST, and reports progress
//! through a single status line. Writes it makes to the connection are
//! marked so the change notification they cause is not mistaken for
//! credentials arriving from the detector or DevTools.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::background::{BackgroundPort, RuntimeMessage};
use crate::client::{RestClient, RestEndpoint, DEFAULT_TIMEOUT};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::openapi::parse_tables_from_openapi;
use crate::store::{connection_from_change, ConnectionStoreExt, KeyValueStore, StorageChanges};
use crate::types::{Connection, ConnectionMeta, MetaSource, StorageKey, Theme};

/// How long a connection write is attributed to this controller.
pub const SELF_WRITE_WINDOW: Duration = Duration::from_millis(500);

/// DevTools captures younger than this reconnect on restore.
pub const DEVTOOLS_RESTORE_WINDOW_MS: i64 = 30_000;

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusKind {
    #[default]
    Idle,
    Progress,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            kind: StatusKind::Idle,
            message: "Idle".to_string(),
        }
    }
}

/// What started a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTrigger {
    User,
    Devtools,
    Restore,
}

impl ConnectTrigger {
    fn progress_message(&self) -> &'static str {
        match self {
            ConnectTrigger::User => "Connecting…",
            ConnectTrigger::Devtools => "DevTools connection…",
            ConnectTrigger::Restore => "Restoring connection…",
        }
    }
}

/// `Connected (N table[s]).`
pub fn connected_message(table_count: usize) -> String {
    match table_count {
        0 => "Connected, but no tables were found.".to_string(),
        1 => "Connected (1 table).".to_string(),
        n => format!("Connected ({} tables).", n),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the panel shows.
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub connection: Option<Connection>,
    pub base_url: Option<String>,
    pub openapi: Option<Value>,
    pub tables: Vec<String>,
    /// `None` means the count is unknown or failed.
    pub row_counts: BTreeMap<String, Option<u64>>,
    pub current_table: Option<String>,
    pub theme: Theme,
    pub status: Status,
}

/// Short-lived marker for connection writes made by this controller.
#[derive(Debug, Default)]
struct WriteMarker {
    marked_at: Option<Instant>,
}

impl WriteMarker {
    fn mark(&mut self) {
        self.marked_at = Some(Instant::now());
    }

    fn is_active(&self) -> bool {
        self.marked_at
            .is_some_and(|at| at.elapsed() < SELF_WRITE_WINDOW)
    }

    fn consume(&mut self) {
        self.marked_at = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

pub struct SidePanelController {
    store: Arc<dyn KeyValueStore>,
    endpoint: RestEndpoint,
    timeout: Duration,
    background: Option<Arc<dyn BackgroundPort>>,
    clock: Arc<dyn Clock>,
    state: PanelState,
    marker: WriteMarker,
}

impl SidePanelController {
    pub fn new(store: Arc<dyn KeyValueStore>, endpoint: RestEndpoint) -> Self {
        Self {
            store,
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            background: None,
            clock: Arc::new(SystemClock),
            state: PanelState::default(),
            marker: WriteMarker::default(),
        }
    }

    pub fn with_background(mut self, background: Arc<dyn BackgroundPort>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn status(&self) -> &Status {
        &self.state.status
    }

    fn set_status(&mut self, kind: StatusKind, message: impl Into<String>) {
        let message = message.into();
        debug!("Side panel status [{:?}]: {}", kind, message);
        self.state.status = Status { kind, message };
    }

    fn apply_connection(&mut self, connection: Option<&Connection>) {
        let connection = connection.map(Connection::normalized);
        self.state.base_url = connection
            .as_ref()
            .filter(|c| !c.project_id.is_empty())
            .map(|c| self.endpoint.base_url(&c.project_id));
        self.state.connection = connection;
    }

    fn reset_tables(&mut self) {
        self.state.tables.clear();
        self.state.row_counts.clear();
        self.state.current_table = None;
    }

    /// REST client for the current connection.
    pub fn rest_client(&self) -> Result<RestClient> {
        let connection = self
            .state
            .connection
            .as_ref()
            .ok_or(Error::MissingCredentials)?;
        RestClient::with_timeout(connection, &self.endpoint, self.timeout)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connect
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect with the given credentials: fetch the table list, persist the
    /// connection and refresh row counts.
    ///
    /// Failures are reported in the status line and returned.
    pub async fn connect(&mut self, connection: &Connection, trigger: ConnectTrigger) -> Result<()> {
        let connection = connection.normalized();
        if !connection.is_usable() {
            self.set_status(StatusKind::Error, Error::MissingCredentials.to_string());
            return Err(Error::MissingCredentials);
        }

        self.apply_connection(Some(&connection));
        let previous_table = self.state.current_table.clone();
        self.reset_tables();
        self.set_status(StatusKind::Progress, trigger.progress_message());

        match self.connect_inner(&connection, previous_table).await {
            Ok(()) => {
                let message = connected_message(self.state.tables.len());
                info!("{} ({})", message, connection.project_id);
                self.set_status(StatusKind::Success, message);
                Ok(())
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", connection.project_id, e);
                self.set_status(StatusKind::Error, e.to_string());
                Err(e)
            }
        }
    }

    async fn connect_inner(&mut self, connection: &Connection, previous_table: Option<String>) -> Result<()> {
        let client = RestClient::with_timeout(connection, &self.endpoint, self.timeout)?;
        let openapi = client.fetch_openapi().await?;
        self.state.tables = parse_tables_from_openapi(&openapi);
        self.state.openapi = Some(openapi);

        let initial = previous_table
            .filter(|t| self.state.tables.contains(t))
            .or_else(|| self.state.tables.first().cloned());
        self.set_active_table(initial.as_deref()).await?;

        let meta = ConnectionMeta {
            source: MetaSource::Sidepanel,
            updated_at: self.clock.now_millis(),
            tab_id: None,
            cleared: None,
        };
        self.marker.mark();
        self.store.save_connection(Some(connection), &meta).await?;

        if !self.state.tables.is_empty() {
            self.refresh_table_counts_with(&client, |_, _| {}).await;
            // Counting can outlast the window; the write is still ours
            self.marker.mark();
        }
        Ok(())
    }

    /// Refresh row counts for every listed table.
    pub async fn refresh_table_counts(&mut self) -> Result<()> {
        self.refresh_table_counts_with_progress(|_, _| {}).await
    }

    /// Refresh row counts, reporting each table as it completes.
    pub async fn refresh_table_counts_with_progress<F>(&mut self, on_count: F) -> Result<()>
    where
        F: FnMut(&str, Option<u64>) + Send,
    {
        let client = self.rest_client()?;
        self.refresh_table_counts_with(&client, on_count).await;
        Ok(())
    }

    async fn refresh_table_counts_with<F>(&mut self, client: &RestClient, mut on_count: F)
    where
        F: FnMut(&str, Option<u64>) + Send,
    {
        if self.state.tables.is_empty() {
            return;
        }
        self.set_status(StatusKind::Progress, "Counting rows…");
        let tables = self.state.tables.clone();
        for table in tables {
            let count = match client.get_table_row_count(&table).await {
                Ok(count) => count,
                Err(e) => {
                    warn!("Failed to count rows for {}: {}", table, e);
                    None
                }
            };
            on_count(&table, count);
            self.state.row_counts.insert(table, count);
        }
        self.set_status(StatusKind::Success, "Row counts updated.");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Selection & Theme
    // ─────────────────────────────────────────────────────────────────────────

    /// Select a table. Unknown tables (or `None`) clear the selection.
    pub async fn set_active_table(&mut self, table: Option<&str>) -> Result<()> {
        match table.filter(|t| self.state.tables.iter().any(|known| known == t)) {
            Some(table) => {
                if self.state.current_table.as_deref() != Some(table) {
                    self.state.current_table = Some(table.to_string());
                    self.store.save_current_table(Some(table)).await?;
                }
            }
            None => {
                self.state.current_table = None;
                self.store.save_current_table(None).await?;
            }
        }
        Ok(())
    }

    pub async fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.state.theme = theme;
        self.store.save_theme(theme).await
    }

    pub async fn toggle_theme(&mut self) -> Result<Theme> {
        let next = self.state.theme.toggled();
        self.set_theme(next).await?;
        Ok(next)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Storage
    // ─────────────────────────────────────────────────────────────────────────

    /// Load saved state; reconnect automatically when DevTools captured the
    /// connection moments ago.
    pub async fn restore_from_storage(&mut self) -> Result<()> {
        let saved = self.store.load_connection().await?;
        self.apply_connection(saved.as_ref());
        self.state.current_table = self.store.load_current_table().await?;
        self.state.theme = self.store.load_theme().await?.unwrap_or_default();
        let meta = self.store.load_meta().await?;

        let usable = saved.as_ref().is_some_and(Connection::is_usable);
        let fresh_capture = meta.is_some_and(|m| {
            m.source == MetaSource::Devtools
                && self.clock.now_millis() - m.updated_at < DEVTOOLS_RESTORE_WINDOW_MS
        });

        match saved {
            Some(connection) if usable && fresh_capture => {
                // Failures already land in the status line
                let _ = self.connect(&connection, ConnectTrigger::Devtools).await;
            }
            _ if usable => {
                self.set_status(
                    StatusKind::Idle,
                    "Restored credentials. Click Connect to refresh tables.",
                );
            }
            _ => self.set_status(StatusKind::Idle, "Idle"),
        }
        Ok(())
    }

    /// Forget the saved connection, its meta and the selected table.
    pub async fn clear_saved_connection(&mut self) -> Result<()> {
        self.marker.mark();
        self.store.clear_connection().await?;
        self.apply_connection(None);
        self.state.openapi = None;
        self.reset_tables();
        self.set_status(StatusKind::Success, "Cleared saved credentials.");
        Ok(())
    }

    /// React to a batch of storage changes.
    pub async fn handle_storage_change(&mut self, changes: &StorageChanges) -> Result<()> {
        if let Some(change) = changes.get(StorageKey::Theme.as_str()) {
            self.state.theme = change
                .new_value
                .as_ref()
                .and_then(Value::as_str)
                .map(Theme::parse)
                .unwrap_or_default();
        }

        let Some(change) = changes.get(StorageKey::Connection.as_str()) else {
            return Ok(());
        };

        let external = !self.marker.is_active();
        self.marker.consume();
        if !external {
            return Ok(());
        }

        let connection = connection_from_change(change);
        self.apply_connection(connection.as_ref());
        self.reset_tables();
        match connection {
            Some(connection) if connection.is_usable() => {
                self.set_status(StatusKind::Success, "Connection details received from DevTools.");
                let _ = self.connect(&connection, ConnectTrigger::Devtools).await;
            }
            _ => self.set_status(StatusKind::Idle, "Connection details cleared."),
        }
        Ok(())
    }

    /// Process change notifications until the store goes away.
    pub async fn listen(&mut self, mut changes: broadcast::Receiver<StorageChanges>) -> Result<()> {
        loop {
            match changes.recv().await {
                Ok(batch) => self.handle_storage_change(&batch).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Side panel missed {} storage change batches", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Explorer
    // ─────────────────────────────────────────────────────────────────────────

    /// Select a table and ask the background to open the explorer overlay.
    pub async fn open_table_explorer(&mut self, table: Option<&str>) -> Result<()> {
        let Some(target) = table
            .map(str::to_string)
            .or_else(|| self.state.current_table.clone())
        else {
            self.set_status(StatusKind::Error, "Select a table first.");
            return Ok(());
        };

        self.set_active_table(Some(&target)).await?;
        self.set_status(StatusKind::Progress, format!("Opening {}…", target));

        let Some(background) = self.background.clone() else {
            self.set_status(StatusKind::Error, "Unable to open explorer on this page.");
            return Ok(());
        };

        let response = background.send(RuntimeMessage::OpenExplorer).await;
        if response.ok {
            self.set_status(StatusKind::Success, format!("Explorer opened for {}.", target));
        } else {
            let reason = response
                .reason
                .unwrap_or_else(|| "Unable to open explorer on this page.".to_string());
            self.set_status(StatusKind::Error, reason);
        }
        Ok(())
    }
}
