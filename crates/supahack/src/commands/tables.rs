//! Table listing, columns and row counts.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::BTreeMap;

use supahack_core::openapi::{extract_columns_from_openapi, parse_tables_from_openapi};

use crate::cli::ConnectionArgs;
use crate::commands::{open_store, resolve_connection, rest_client};
use crate::config::Config;

pub async fn list(args: &ConnectionArgs, counts: bool, json: bool, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let connection = resolve_connection(args, &store).await?;
    let client = rest_client(config, &connection)?;

    let openapi = client.fetch_openapi().await?;
    let tables = parse_tables_from_openapi(&openapi);

    let mut row_counts = BTreeMap::new();
    if counts && !tables.is_empty() {
        let progress = ProgressBar::new(tables.len() as u64);
        progress.set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")?);
        for table in &tables {
            progress.set_message(table.clone());
            let count = match client.get_table_row_count(table).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!("Failed to count rows for {}: {}", table, e);
                    None
                }
            };
            row_counts.insert(table.clone(), count);
            progress.inc(1);
        }
        progress.finish_and_clear();
    }

    if json {
        let rows: Vec<_> = tables
            .iter()
            .map(|t| json!({ "name": t, "rows": row_counts.get(t).copied().flatten() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    print_tables(&tables, &row_counts, None);
    Ok(())
}

pub async fn columns(args: &ConnectionArgs, table: &str, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let connection = resolve_connection(args, &store).await?;
    let client = rest_client(config, &connection)?;

    let openapi = client.fetch_openapi().await?;
    let columns = match extract_columns_from_openapi(&openapi, table, &connection.schema) {
        Some(columns) => Some(columns),
        None => client.infer_columns(table).await?,
    };

    match columns {
        Some(columns) => {
            println!("{} {}", table.cyan().bold(), format!("({} columns)", columns.len()).dimmed());
            for column in columns {
                println!("  {}", column);
            }
        }
        None => println!("{}", format!("○ No columns found for {}", table).yellow()),
    }
    Ok(())
}

pub async fn count(args: &ConnectionArgs, table: &str, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let connection = resolve_connection(args, &store).await?;
    let client = rest_client(config, &connection)?;

    match client.get_table_row_count(table).await? {
        Some(count) => println!("{}", count),
        None => println!("{}", "unknown".yellow()),
    }
    Ok(())
}

/// Print a table list with optional counts, marking the selected table.
pub fn print_tables(tables: &[String], row_counts: &BTreeMap<String, Option<u64>>, current: Option<&str>) {
    if tables.is_empty() {
        println!("{}", "No tables found.".yellow());
        return;
    }

    println!("{}", "Tables".cyan().bold());
    println!("{}", "─".repeat(50));
    for table in tables {
        let marker = if current == Some(table.as_str()) { "›" } else { " " };
        match row_counts.get(table) {
            Some(Some(count)) => println!("{} {:<38} {:>10}", marker, table, count),
            Some(None) => println!("{} {:<38} {:>10}", marker, table, "?".dimmed()),
            None => println!("{} {}", marker, table),
        }
    }
}
