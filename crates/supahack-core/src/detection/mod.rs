//! Credential detection.
//!
//! - **cache**: last credentials seen per tab
//! - **throttle**: per-tab cooldown for automatic side panel opens
//! - **reconciler**: cache/store reconciliation and tab clearing

pub mod cache;
pub mod reconciler;
pub mod throttle;

pub use cache::{cache_key, DetectionCache, DetectionCacheEntry, GLOBAL_KEY};
pub use reconciler::{
    clear_tab_detection, handle_tab_navigation, reconcile_detection, ClearOutcome,
    DetectionContext, DetectionEvent, ReconcileOutcome, SkipReason,
};
pub use throttle::{PanelOpenOutcome, PanelOpenThrottle, PANEL_OPEN_COOLDOWN_MS};
