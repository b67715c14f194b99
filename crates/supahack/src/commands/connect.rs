//! Connect and save the connection, the way the side panel's Connect button
//! does.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use supahack_core::sidepanel::{ConnectTrigger, SidePanelController, StatusKind};

use crate::cli::ConnectionArgs;
use crate::commands::tables::print_tables;
use crate::commands::{open_store, resolve_connection};
use crate::config::Config;

pub async fn execute(args: &ConnectionArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let connection = resolve_connection(args, &store).await?;

    let mut panel = SidePanelController::new(store, config.endpoint()).with_timeout(config.timeout());
    panel.restore_from_storage().await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(format!("Connecting to {}…", connection.project_id));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = panel.connect(&connection, ConnectTrigger::User).await;
    spinner.finish_and_clear();

    let status = panel.status();
    match status.kind {
        StatusKind::Error => println!("{}", format!("✗ {}", status.message).red()),
        _ => println!("{}", format!("✓ {}", status.message).green()),
    }
    result?;

    let state = panel.state();
    if let Some(base_url) = &state.base_url {
        println!("  {} {}", "Base URL:".cyan(), base_url);
    }
    println!();
    print_tables(&state.tables, &state.row_counts, state.current_table.as_deref());
    Ok(())
}
