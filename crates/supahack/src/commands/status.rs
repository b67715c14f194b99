//! Saved connection, clearing it, and the panel theme.

use anyhow::Result;
use chrono::{Local, TimeZone};
use colored::Colorize;
use dialoguer::Confirm;
use serde_json::json;

use supahack_core::sidepanel::SidePanelController;
use supahack_core::types::mask_secret;
use supahack_core::{ConnectionMeta, ConnectionStoreExt, Theme};

use crate::cli::ThemeChoice;
use crate::commands::open_store;
use crate::config::Config;

pub async fn show(json: bool, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let connection = store.load_connection().await?;
    let meta = store.load_meta().await?;
    let table = store.load_current_table().await?;
    let theme = store.load_theme().await?.unwrap_or_default();

    if json {
        let output = json!({
            "connection": connection.as_ref().map(|c| json!({
                "projectId": c.project_id,
                "schema": c.schema,
                "apiKey": mask_secret(&c.api_key),
                "restUrl": config.endpoint().base_url(&c.project_id),
            })),
            "meta": meta,
            "currentTable": table,
            "theme": theme,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "SupaHack Status".cyan().bold());
    println!("{}", "─".repeat(50));
    match &connection {
        Some(c) => {
            println!("  Project:  {}", c.project_id.bold());
            println!("  REST URL: {}", config.endpoint().base_url(&c.project_id));
            println!("  Schema:   {}", c.schema);
            println!("  API key:  {}", mask_secret(&c.api_key));
            if c.bearer != c.api_key {
                println!("  Bearer:   {}", mask_secret(&c.bearer));
            }
        }
        None => println!("  {}", "○ No saved connection".yellow()),
    }
    if let Some(meta) = &meta {
        println!("  Source:   {}", describe_meta(meta));
    }
    println!("  Table:    {}", table.as_deref().unwrap_or("-"));
    println!("  Theme:    {}", theme);
    Ok(())
}

pub async fn clear(yes: bool, config: &Config) -> Result<()> {
    if !yes
        && !Confirm::new()
            .with_prompt("Forget the saved connection?")
            .default(false)
            .interact()?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let store = open_store(config)?;
    let mut panel = SidePanelController::new(store, config.endpoint());
    panel.clear_saved_connection().await?;
    println!("{}", format!("✓ {}", panel.status().message).green());
    Ok(())
}

pub async fn theme(choice: Option<ThemeChoice>, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let mut panel = SidePanelController::new(store, config.endpoint());
    panel.restore_from_storage().await?;

    let theme = match choice {
        None => panel.state().theme,
        Some(ThemeChoice::Toggle) => panel.toggle_theme().await?,
        Some(ThemeChoice::Dark) => set(&mut panel, Theme::Dark).await?,
        Some(ThemeChoice::Light) => set(&mut panel, Theme::Light).await?,
    };
    println!("{}", theme);
    Ok(())
}

async fn set(panel: &mut SidePanelController, theme: Theme) -> Result<Theme> {
    panel.set_theme(theme).await?;
    Ok(theme)
}

fn describe_meta(meta: &ConnectionMeta) -> String {
    let when = Local
        .timestamp_millis_opt(meta.updated_at)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| meta.updated_at.to_string());
    let mut text = format!("{} at {}", meta.source, when);
    if let Some(tab_id) = meta.tab_id {
        text.push_str(&format!(" (tab {})", tab_id));
    }
    if meta.is_cleared() {
        text.push_str(", cleared");
    }
    text
}
