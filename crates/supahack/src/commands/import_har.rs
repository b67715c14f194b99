//! Import DevTools HAR exports into the capture list and apply one.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::sync::Arc;

use supahack_core::devtools::{parse_har, CaptureLog};
use supahack_core::types::{mask_secret, TabId};
use supahack_core::{Background, Connection, ConnectionStoreExt, RuntimeMessage};

use crate::cli::ImportHarArgs;
use crate::commands::open_store;
use crate::config::Config;
use crate::error::CliError;
use crate::host::HeadlessHost;

/// Header values longer than this are masked in the listing.
const MASK_THRESHOLD: usize = 16;

pub async fn execute(args: ImportHarArgs, config: &Config) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let log = load_captures(&content, args.tab_id)?;

    println!("{}", log.status_line().dimmed());
    for (index, entry) in log.entries().enumerate() {
        println!(
            "{:>3}  {:<6} {:<22} {}",
            index,
            entry.method.bold(),
            entry.status_summary(),
            entry.url
        );
        for header in entry.interesting_headers() {
            let value = if header.value.len() > MASK_THRESHOLD {
                mask_secret(&header.value)
            } else {
                header.value.clone()
            };
            println!("       {} {}", format!("{}:", header.name).dimmed(), value);
        }
    }

    let Some(index) = args.apply else {
        return Ok(());
    };

    let store = open_store(config)?;
    let host = Arc::new(HeadlessHost::new());
    let background = Background::new(store.clone(), host.clone());
    let connection = apply_capture(&background, &log, index).await?;

    println!();
    println!("{} {}", "✓ Applied connection for".green(), connection.project_id.bold());
    println!("  Schema:  {}", connection.schema);
    println!("  API key: {}", mask_secret(&connection.api_key));
    for tab_id in host.panel_opens() {
        println!("  Side panel would open for tab {}", tab_id);
    }
    Ok(())
}

fn load_captures(content: &str, tab_id: Option<TabId>) -> Result<CaptureLog> {
    let entries = parse_har(content)?;
    let mut log = CaptureLog::default();
    for entry in &entries {
        log.record(entry, tab_id);
    }
    Ok(log)
}

/// Send the capture at `index` to the background, as the DevTools panel's
/// "Use credentials" button does, and return what was saved.
async fn apply_capture(background: &Background, log: &CaptureLog, index: usize) -> Result<Connection> {
    let entry = log.entries().nth(index).ok_or(CliError::NoSuchCapture(index))?;
    let response = background
        .handle_message(RuntimeMessage::CapturedRequest(entry.to_payload()), None)
        .await;
    if !response.ok {
        bail!(response.reason.unwrap_or_else(|| "Failed to apply captured request".to_string()));
    }

    background
        .store()
        .load_connection()
        .await?
        .context("Connection was not saved")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use supahack_core::{MemoryStore, MetaSource};

    fn har() -> String {
        json!({
            "log": {
                "entries": [
                    {
                        "startedDateTime": "2026-01-01T00:00:00Z",
                        "time": 12.5,
                        "request": {
                            "method": "GET",
                            "url": "https://abcd.supabase.co/rest/v1/todos?select=*",
                            "headers": [
                                {"name": "apikey", "value": "anon-key"},
                                {"name": "Accept-Profile", "value": "api"}
                            ]
                        },
                        "response": {"status": 200, "statusText": "OK"},
                        "_requestId": "r1"
                    },
                    {
                        "request": {
                            "method": "GET",
                            "url": "https://cdn.example.com/app.js",
                            "headers": []
                        }
                    },
                    {
                        "request": {
                            "method": "POST",
                            "url": "https://abcd.supabase.co/auth/v1/token",
                            "headers": [{"name": "Content-Type", "value": "application/json"}]
                        },
                        "_requestId": "r2"
                    }
                ]
            }
        })
        .to_string()
    }

    #[test]
    fn test_load_captures_filters_and_orders_newest_first() {
        let log = load_captures(&har(), Some(9)).unwrap();
        assert_eq!(log.len(), 2);
        let ids: Vec<_> = log.entries().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
        assert!(log.entries().all(|e| e.tab_id == Some(9)));
    }

    #[tokio::test]
    async fn test_apply_capture_saves_devtools_connection() {
        let log = load_captures(&har(), Some(9)).unwrap();
        let store = Arc::new(MemoryStore::new());
        let host = Arc::new(HeadlessHost::new());
        let background = Background::new(store.clone(), host.clone());

        let connection = apply_capture(&background, &log, 1).await.unwrap();
        assert_eq!(connection.project_id, "abcd");
        assert_eq!(connection.schema, "api");
        assert_eq!(connection.api_key, "anon-key");

        let meta = store.load_meta().await.unwrap().unwrap();
        assert_eq!(meta.source, MetaSource::Devtools);
        assert_eq!(meta.tab_id, Some(9));
        assert_eq!(host.panel_opens(), vec![9]);
    }

    #[tokio::test]
    async fn test_apply_capture_without_key_fails() {
        let log = load_captures(&har(), None).unwrap();
        let background = Background::new(Arc::new(MemoryStore::new()), Arc::new(HeadlessHost::new()));

        let err = apply_capture(&background, &log, 0).await.unwrap_err();
        assert_eq!(err.to_string(), "No API key header found in captured request.");

        let err = apply_capture(&background, &log, 5).await.unwrap_err();
        assert_eq!(err.to_string(), "No captured request at index 5");
    }
}
