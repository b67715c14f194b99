//! supahack - Supabase REST credential detector and table explorer
//!
//! Runs the extension's background and side panel logic from the terminal:
//! feed observed requests or HAR captures through detection, then browse
//! and edit the tables behind the resulting connection.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod error;
mod host;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("supahack=info".parse()?);
    if config.logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let conn = &cli.connection;

    // Execute command
    match cli.command {
        Commands::Detect(args) => commands::detect::execute(args, &config).await,
        Commands::DecodeToken { token } => commands::decode_token::execute(&token),
        Commands::Connect => commands::connect::execute(conn, &config).await,
        Commands::Tables { counts, no_counts, json } => {
            let counts = if counts {
                true
            } else if no_counts {
                false
            } else {
                config.display.auto_counts
            };
            commands::tables::list(conn, counts, json, &config).await
        }
        Commands::Columns { table } => commands::tables::columns(conn, &table, &config).await,
        Commands::Count { table } => commands::tables::count(conn, &table, &config).await,
        Commands::Rows(args) => commands::rows::execute(args, conn, &config).await,
        Commands::Insert { table, values } => {
            commands::write::insert(conn, &table, &values, &config).await
        }
        Commands::Update { table, filters, values, yes } => {
            commands::write::update(conn, &table, &filters, &values, yes, &config).await
        }
        Commands::Delete { table, filters, yes } => {
            commands::write::delete(conn, &table, &filters, yes, &config).await
        }
        Commands::ImportHar(args) => commands::import_har::execute(args, &config).await,
        Commands::Status { json } => commands::status::show(json, &config).await,
        Commands::Clear { yes } => commands::status::clear(yes, &config).await,
        Commands::Theme { value } => commands::status::theme(value, &config).await,
        Commands::Doctor => commands::doctor::execute(conn, &config).await,
        Commands::Version => {
            println!("supahack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
