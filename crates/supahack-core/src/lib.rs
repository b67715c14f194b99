//! supahack-core - Core library for SupaHack
//!
//! This crate provides the logic shared by the browser extension binding and
//! the `supahack` CLI:
//!
//! - **credentials**: project id and schema extraction from URLs and tokens
//! - **detection**: detection cache, connection reconciler, panel throttle
//! - **store**: key-value connection store with change notifications
//! - **overlay**: explorer overlay messaging with lazy script injection
//! - **background**: runtime message and browser event dispatch
//! - **devtools**: captured request list and HAR import
//! - **openapi**: table and column discovery
//! - **client**: PostgREST client (`client` feature)
//! - **sidepanel**: headless side panel controller (`client` feature)

pub mod background;
pub mod clock;
pub mod credentials;
pub mod detection;
pub mod devtools;
pub mod error;
pub mod host;
pub mod openapi;
pub mod overlay;
pub mod store;
pub mod types;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub mod sidepanel;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use background::{Background, BackgroundPort, RuntimeMessage};
pub use error::{Error, Result};
pub use store::{ConnectionStoreExt, KeyValueStore, MemoryStore};
pub use types::{Connection, ConnectionMeta, MessageResponse, MetaSource, Theme};
