//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// SupaHack CLI
///
/// Detect Supabase REST credentials and explore the tables behind them.
#[derive(Parser, Debug)]
#[command(name = "supahack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Credentials that override the saved connection.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Supabase project reference
    #[arg(long, global = true, env = "SUPAHACK_PROJECT_ID")]
    pub project_id: Option<String>,

    /// API key (anon or service role)
    #[arg(long, global = true, env = "SUPAHACK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Bearer token (defaults to the API key)
    #[arg(long, global = true, hide_env_values = true)]
    pub bearer: Option<String>,

    /// Database schema
    #[arg(long, global = true, env = "SUPAHACK_SCHEMA")]
    pub schema: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed one observed request through credential detection
    Detect(DetectArgs),

    /// Decode a Supabase JWT and show its project reference
    DecodeToken {
        /// The token (a `Bearer ` prefix is accepted)
        token: String,
    },

    /// Connect, list tables and save the connection
    Connect,

    /// List tables from the OpenAPI description
    Tables {
        /// Count rows per table (overrides display.auto_counts)
        #[arg(long, conflicts_with = "no_counts")]
        counts: bool,

        /// Skip row counts
        #[arg(long)]
        no_counts: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the columns of a table
    Columns {
        /// Table name
        table: String,
    },

    /// Exact row count of a table
    Count {
        /// Table name
        table: String,
    },

    /// Read rows from a table
    Rows(RowsArgs),

    /// Insert a row
    Insert {
        /// Table name
        table: String,

        /// Values as column=value
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Update rows matching filters
    Update {
        /// Table name
        table: String,

        /// Filters as column:op:value
        #[arg(short = 'f', long = "filter", required = true)]
        filters: Vec<String>,

        /// New values as column=value
        #[arg(short = 's', long = "set", required = true)]
        values: Vec<String>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete rows matching filters
    Delete {
        /// Table name
        table: String,

        /// Filters as column:op:value
        #[arg(short = 'f', long = "filter", required = true)]
        filters: Vec<String>,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Import captured requests from a HAR file
    ImportHar(ImportHarArgs),

    /// Show the saved connection
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Forget the saved connection
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or change the panel theme
    Theme {
        /// New theme
        #[arg(value_enum)]
        value: Option<ThemeChoice>,
    },

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Request URL
    pub url: String,

    /// `apikey` header value
    #[arg(long)]
    pub apikey: Option<String>,

    /// `authorization` header value
    #[arg(long)]
    pub authorization: Option<String>,

    /// `accept-profile` header value
    #[arg(long)]
    pub profile: Option<String>,

    /// Tab the request came from
    #[arg(long)]
    pub tab_id: Option<i64>,

    /// Page that issued the request
    #[arg(long)]
    pub initiator: Option<String>,
}

#[derive(Args, Debug)]
pub struct RowsArgs {
    /// Table name
    pub table: String,

    /// Columns to select (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Filters as column:op:value
    #[arg(short = 'f', long = "filter")]
    pub filters: Vec<String>,

    /// Order by column
    #[arg(short, long)]
    pub order: Option<String>,

    /// Sort descending
    #[arg(long, requires = "order")]
    pub desc: bool,

    /// Rows per page (defaults to display.page_size)
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ImportHarArgs {
    /// HAR file exported from DevTools
    pub file: PathBuf,

    /// Apply the captured request at this index (0 = newest)
    #[arg(long)]
    pub apply: Option<usize>,

    /// Tab id recorded with the capture
    #[arg(long)]
    pub tab_id: Option<i64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeChoice {
    Dark,
    Light,
    Toggle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rows() {
        let cli = Cli::try_parse_from([
            "supahack", "rows", "users", "-c", "id,email", "-f", "id:gt:10", "--order", "id", "--desc",
            "--page", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Rows(args) => {
                assert_eq!(args.columns, vec!["id", "email"]);
                assert_eq!(args.filters, vec!["id:gt:10"]);
                assert!(args.desc);
                assert_eq!(args.page, 2);
                assert_eq!(args.limit, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_connection_flags() {
        let cli = Cli::try_parse_from(["supahack", "tables", "--project-id", "abc", "--api-key", "k"]).unwrap();
        assert_eq!(cli.connection.project_id.as_deref(), Some("abc"));
        assert_eq!(cli.connection.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_delete_requires_filter() {
        assert!(Cli::try_parse_from(["supahack", "delete", "users"]).is_err());
        assert!(Cli::try_parse_from(["supahack", "rows", "users", "--page", "0"]).is_err());
    }
}
