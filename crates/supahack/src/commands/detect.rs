//! Feed one observed request through credential detection.

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use supahack_core::detection::{ReconcileOutcome, SkipReason};
use supahack_core::devtools::HeaderEntry;
use supahack_core::types::mask_secret;
use supahack_core::{Background, ConnectionStoreExt};

use crate::cli::DetectArgs;
use crate::commands::open_store;
use crate::config::Config;
use crate::host::HeadlessHost;

pub async fn execute(args: DetectArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let host = Arc::new(HeadlessHost::new());
    let background = Background::new(store.clone(), host.clone());

    match detect(&background, &args).await? {
        None => println!("{}", "○ Not a Supabase REST request with an API key".yellow()),
        Some(ReconcileOutcome::Skipped(SkipReason::MissingApiKey)) => {
            println!("{}", "○ Skipped: no API key".yellow())
        }
        Some(ReconcileOutcome::Skipped(SkipReason::UnresolvedProject)) => {
            println!("{}", "○ Skipped: could not determine the project".yellow())
        }
        Some(ReconcileOutcome::Duplicate) | Some(ReconcileOutcome::MetaRefreshed) => {
            println!("{}", "✓ Connection already up to date".green())
        }
        Some(ReconcileOutcome::Retained) => println!(
            "{}",
            "✓ Same credentials already saved from DevTools or the side panel".green()
        ),
        Some(ReconcileOutcome::Updated { project_id }) => {
            println!("{} {}", "✓ Saved connection for".green(), project_id.bold());
            if let Some(connection) = store.load_connection().await? {
                println!("  Schema:  {}", connection.schema);
                println!("  API key: {}", mask_secret(&connection.api_key));
            }
        }
    }

    for tab_id in host.panel_opens() {
        println!("  Side panel would open for tab {}", tab_id);
    }
    Ok(())
}

/// Build the request headers from the arguments and run them through the
/// background request observer.
async fn detect(background: &Background, args: &DetectArgs) -> Result<Option<ReconcileOutcome>> {
    let headers: Vec<HeaderEntry> = [
        ("apikey", &args.apikey),
        ("authorization", &args.authorization),
        ("accept-profile", &args.profile),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        value.as_ref().map(|value| HeaderEntry {
            name: name.to_string(),
            value: value.clone(),
        })
    })
    .collect();

    let outcome = background
        .on_before_send_headers(args.tab_id, &args.url, &headers, args.initiator.as_deref())
        .await?;
    Ok(outcome)
}
