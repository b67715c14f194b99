//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::host::{BrowserHost, TabInfo, TabMessage};
use crate::types::TabId;

pub const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

#[derive(Default)]
struct HostState {
    active_tab: Option<TabInfo>,
    scripted_tabs: HashSet<TabId>,
    delivered: Vec<(TabId, TabMessage)>,
    message_attempts: usize,
    injections: Vec<(TabId, String)>,
    inject_failure: Option<String>,
    inject_without_effect: bool,
    panel_options: Vec<(TabId, String)>,
    panel_opens: Vec<TabId>,
    panel_failure: Option<String>,
}

/// Browser host that records every call.
///
/// Tab messages only reach tabs that have a content script, either from
/// [`RecordingHost::with_content_script`] or after an injection.
#[derive(Default)]
pub struct RecordingHost {
    state: Mutex<HostState>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active_tab(self, id: TabId, url: &str) -> Self {
        self.state.lock().unwrap().active_tab = Some(TabInfo {
            id,
            url: Some(url.to_string()),
        });
        self
    }

    pub fn with_content_script(self, id: TabId) -> Self {
        self.state.lock().unwrap().scripted_tabs.insert(id);
        self
    }

    pub fn fail_injection(&self, message: &str) {
        self.state.lock().unwrap().inject_failure = Some(message.to_string());
    }

    /// Injection "succeeds" but the script never starts listening.
    pub fn inject_without_effect(&self) {
        self.state.lock().unwrap().inject_without_effect = true;
    }

    pub fn fail_panel_open(&self, message: &str) {
        self.state.lock().unwrap().panel_failure = Some(message.to_string());
    }

    pub fn clear_panel_failure(&self) {
        self.state.lock().unwrap().panel_failure = None;
    }

    pub fn delivered(&self) -> Vec<(TabId, TabMessage)> {
        self.state.lock().unwrap().delivered.clone()
    }

    pub fn message_attempts(&self) -> usize {
        self.state.lock().unwrap().message_attempts
    }

    pub fn injections(&self) -> Vec<(TabId, String)> {
        self.state.lock().unwrap().injections.clone()
    }

    pub fn panel_opens(&self) -> Vec<TabId> {
        self.state.lock().unwrap().panel_opens.clone()
    }

    pub fn panel_option_paths(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .panel_options
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }
}

#[async_trait]
impl BrowserHost for RecordingHost {
    async fn active_tab(&self) -> Result<Option<TabInfo>> {
        Ok(self.state.lock().unwrap().active_tab.clone())
    }

    async fn send_tab_message(&self, tab_id: TabId, message: TabMessage) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.message_attempts += 1;
        if state.scripted_tabs.contains(&tab_id) {
            state.delivered.push((tab_id, message));
            Ok(())
        } else {
            Err(Error::host(NO_RECEIVER))
        }
    }

    async fn inject_script(&self, tab_id: TabId, file: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.injections.push((tab_id, file.to_string()));
        if let Some(message) = state.inject_failure.clone() {
            return Err(Error::host(message));
        }
        if !state.inject_without_effect {
            state.scripted_tabs.insert(tab_id);
        }
        Ok(())
    }

    async fn set_side_panel_options(&self, tab_id: TabId, path: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .panel_options
            .push((tab_id, path.to_string()));
        Ok(())
    }

    async fn open_side_panel(&self, tab_id: TabId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.panel_failure.clone() {
            return Err(Error::host(message));
        }
        state.panel_opens.push(tab_id);
        Ok(())
    }
}
