//! Side panel open throttle.
//!
//! Detection fires on every matching request, so automatic panel opens are
//! rate limited per tab. The attempt is recorded before the asynchronous open
//! so concurrent triggers for the same tab collapse into one call.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::Error;
use crate::host::{BrowserHost, SIDE_PANEL_PATH};
use crate::types::TabId;

/// Minimum interval between open attempts for one tab.
pub const PANEL_OPEN_COOLDOWN_MS: i64 = 5000;

/// Result of an open attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelOpenOutcome {
    /// Opened (or at least the host accepted the request).
    Opened,
    /// Skipped because the tab is still cooling down.
    Throttled,
    /// The host refused; carries its message.
    Failed(String),
}

impl PanelOpenOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, PanelOpenOutcome::Opened)
    }
}

#[derive(Debug)]
pub struct PanelOpenThrottle {
    cooldown_ms: i64,
    last_open: Mutex<HashMap<TabId, i64>>,
}

impl Default for PanelOpenThrottle {
    fn default() -> Self {
        Self::new(PANEL_OPEN_COOLDOWN_MS)
    }
}

impl PanelOpenThrottle {
    pub fn new(cooldown_ms: i64) -> Self {
        Self {
            cooldown_ms,
            last_open: Mutex::new(HashMap::new()),
        }
    }

    /// Open the side panel for a tab unless it was attempted within the
    /// cooldown window. `force` bypasses the window.
    pub async fn open_side_panel_for_tab(
        &self,
        host: &dyn BrowserHost,
        clock: &dyn Clock,
        tab_id: TabId,
        force: bool,
    ) -> PanelOpenOutcome {
        let now = clock.now_millis();
        {
            let mut last_open = self.lock();
            if !force {
                if let Some(last) = last_open.get(&tab_id) {
                    if now - last < self.cooldown_ms {
                        debug!("Side panel open for tab {} throttled", tab_id);
                        return PanelOpenOutcome::Throttled;
                    }
                }
            }
            last_open.insert(tab_id, now);
        }

        match Self::open(host, tab_id).await {
            Ok(()) => PanelOpenOutcome::Opened,
            Err(e) => {
                if e.is_user_gesture_required() {
                    debug!("Side panel open for tab {} needs a user gesture", tab_id);
                    self.lock().remove(&tab_id);
                } else {
                    warn!("Failed to open side panel for tab {}: {}", tab_id, e);
                }
                PanelOpenOutcome::Failed(e.to_string())
            }
        }
    }

    async fn open(host: &dyn BrowserHost, tab_id: TabId) -> Result<(), Error> {
        host.set_side_panel_options(tab_id, SIDE_PANEL_PATH).await?;
        host.open_side_panel(tab_id).await
    }

    /// Last recorded attempt for a tab.
    pub fn last_attempt(&self, tab_id: TabId) -> Option<i64> {
        self.lock().get(&tab_id).copied()
    }

    /// Drop the tab's entry (tab closed).
    pub fn forget(&self, tab_id: TabId) {
        self.lock().remove(&tab_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TabId, i64>> {
        self.last_open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::RecordingHost;

    #[tokio::test]
    async fn test_second_open_within_cooldown_is_throttled() {
        let host = RecordingHost::new();
        let clock = ManualClock::new(10_000);
        let throttle = PanelOpenThrottle::default();

        let first = throttle.open_side_panel_for_tab(&host, &clock, 3, false).await;
        clock.advance(4_999);
        let second = throttle.open_side_panel_for_tab(&host, &clock, 3, false).await;

        assert_eq!(first, PanelOpenOutcome::Opened);
        assert_eq!(second, PanelOpenOutcome::Throttled);
        assert_eq!(host.panel_opens(), vec![3]);
    }

    #[tokio::test]
    async fn test_open_allowed_after_cooldown_or_forced() {
        let host = RecordingHost::new();
        let clock = ManualClock::new(0);
        let throttle = PanelOpenThrottle::default();

        throttle.open_side_panel_for_tab(&host, &clock, 1, false).await;
        clock.advance(100);
        let forced = throttle.open_side_panel_for_tab(&host, &clock, 1, true).await;
        assert!(forced.is_opened());

        clock.advance(PANEL_OPEN_COOLDOWN_MS);
        let later = throttle.open_side_panel_for_tab(&host, &clock, 1, false).await;
        assert!(later.is_opened());

        // Other tabs are independent
        let other = throttle.open_side_panel_for_tab(&host, &clock, 2, false).await;
        assert!(other.is_opened());
        assert_eq!(host.panel_opens(), vec![1, 1, 1, 2]);
        assert_eq!(host.panel_option_paths(), vec![SIDE_PANEL_PATH.to_string(); 4]);
    }

    #[tokio::test]
    async fn test_user_gesture_failure_rolls_back_timestamp() {
        let host = RecordingHost::new();
        host.fail_panel_open("sidePanel.open() may only be called in response to a user gesture.");
        let clock = ManualClock::new(0);
        let throttle = PanelOpenThrottle::default();

        let outcome = throttle.open_side_panel_for_tab(&host, &clock, 9, false).await;
        assert!(matches!(outcome, PanelOpenOutcome::Failed(_)));
        assert_eq!(throttle.last_attempt(9), None);

        // The next genuine gesture goes straight through
        host.clear_panel_failure();
        clock.advance(10);
        let retry = throttle.open_side_panel_for_tab(&host, &clock, 9, false).await;
        assert!(retry.is_opened());
    }

    #[tokio::test]
    async fn test_other_failures_keep_timestamp() {
        let host = RecordingHost::new();
        host.fail_panel_open("No tab with id: 9");
        let clock = ManualClock::new(50);
        let throttle = PanelOpenThrottle::default();

        let outcome = throttle.open_side_panel_for_tab(&host, &clock, 9, false).await;
        assert_eq!(outcome, PanelOpenOutcome::Failed("No tab with id: 9".into()));
        assert_eq!(throttle.last_attempt(9), Some(50));

        throttle.forget(9);
        assert_eq!(throttle.last_attempt(9), None);
    }
}
