//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;

use supahack_core::credentials::decode_project_ref_from_token;
use supahack_core::openapi::parse_tables_from_openapi;
use supahack_core::store::SqliteStore;

use crate::cli::ConnectionArgs;
use crate::commands::{resolve_connection, rest_client};
use crate::config::Config;

pub async fn execute(args: &ConnectionArgs, config: &Config) -> Result<()> {
    println!("{}", "supahack Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Check data directory
    print!("  Data directory: ");
    if config.paths.data_dir.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ will be created".yellow());
    }

    // Check store
    print!("  Store: ");
    let store = match config
        .ensure_dirs()
        .and_then(|_| SqliteStore::open(&config.store_path()).map_err(anyhow::Error::from))
    {
        Ok(store) => match store.ping() {
            Ok(()) => {
                println!("{}", "✓ connected".green());
                Some(store)
            }
            Err(e) => {
                println!("{}", format!("✗ {}", e).red());
                issues.push("Store is not readable");
                None
            }
        },
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Store not accessible");
            None
        }
    };

    // Check connection
    print!("  Connection: ");
    let connection = match &store {
        Some(store) => resolve_connection(args, store).await.ok(),
        None => None,
    };
    let Some(connection) = connection else {
        println!("{}", "○ none saved".yellow());
        summarize(&issues);
        return Ok(());
    };
    println!("{} ({})", connection.project_id.green(), connection.schema);

    if let Some(reference) = decode_project_ref_from_token(&connection.api_key) {
        print!("  API key project: ");
        if reference == connection.project_id {
            println!("{}", "✓ matches".green());
        } else {
            println!("{}", format!("✗ issued for {}", reference).red());
            issues.push("API key belongs to a different project");
        }
    }

    // Check REST API
    let client = rest_client(config, &connection)?;
    print!("  REST API ({}): ", client.base_url());
    match client.fetch_openapi().await {
        Ok(openapi) => {
            let tables = parse_tables_from_openapi(&openapi).len();
            println!("{}", format!("✓ reachable ({} tables)", tables).green());
        }
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Cannot reach the PostgREST API");
        }
    }

    summarize(&issues);
    Ok(())
}

fn summarize(issues: &[&str]) {
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in issues {
            println!("  • {}", issue);
        }
    }
}
