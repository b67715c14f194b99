//! Command implementations for the supahack CLI.
//!
//! Each submodule implements the logic for a command group. Shared helpers
//! for resolving the connection and parsing row input live here.

pub mod connect;
pub mod decode_token;
pub mod detect;
pub mod doctor;
pub mod import_har;
pub mod rows;
pub mod status;
pub mod tables;
pub mod write;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

use supahack_core::client::{coerce_input_value, Filter, RestClient};
use supahack_core::store::SqliteStore;
use supahack_core::{Connection, ConnectionStoreExt};

use crate::cli::ConnectionArgs;
use crate::config::Config;
use crate::error::CliError;

/// Open the connection store, creating the data directory if needed.
pub fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    config.ensure_dirs()?;
    let path = config.store_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Credentials from flags or environment, falling back to the saved
/// connection. Flags override individual saved fields.
pub async fn resolve_connection(args: &ConnectionArgs, store: &SqliteStore) -> Result<Connection> {
    let saved = store.load_connection().await?.unwrap_or_default();
    let connection = merge_connection(args, saved);
    if !connection.is_usable() {
        return Err(CliError::NoConnection.into());
    }
    Ok(connection)
}

fn merge_connection(args: &ConnectionArgs, saved: Connection) -> Connection {
    let override_key = args.api_key.is_some();
    let connection = Connection {
        project_id: args.project_id.clone().unwrap_or(saved.project_id),
        schema: args.schema.clone().unwrap_or(saved.schema),
        api_key: args.api_key.clone().unwrap_or(saved.api_key),
        // A new key invalidates the saved bearer unless one is given too
        bearer: match (&args.bearer, override_key) {
            (Some(bearer), _) => bearer.clone(),
            (None, true) => String::new(),
            (None, false) => saved.bearer,
        },
    };
    connection.normalized()
}

/// REST client for the resolved connection.
pub fn rest_client(config: &Config, connection: &Connection) -> Result<RestClient> {
    Ok(RestClient::with_timeout(connection, &config.endpoint(), config.timeout())?)
}

/// Parse `column=value` pairs into a JSON object.
pub fn parse_assignments(values: &[String]) -> Result<Map<String, Value>> {
    let mut row = Map::new();
    for assignment in values {
        let (column, value) = assignment
            .split_once('=')
            .filter(|(column, _)| !column.trim().is_empty())
            .ok_or_else(|| CliError::InvalidAssignment(assignment.clone()))?;
        row.insert(column.trim().to_string(), coerce_input_value(value));
    }
    Ok(row)
}

/// Parse `column:op:value` filters.
pub fn parse_filters(filters: &[String]) -> Result<Vec<Filter>> {
    filters
        .iter()
        .map(|f| Filter::parse(f).map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use supahack_core::client::FilterOp;

    #[test]
    fn test_parse_assignments() {
        let row = parse_assignments(&["name=Ada".into(), "age=36".into(), "admin=true".into()]).unwrap();
        assert_eq!(row.get("name"), Some(&Value::from("Ada")));
        assert_eq!(row.get("age"), Some(&Value::from(36)));
        assert_eq!(row.get("admin"), Some(&Value::Bool(true)));

        assert!(parse_assignments(&["novalue".into()]).is_err());
        assert!(parse_assignments(&["=x".into()]).is_err());
    }

    #[test]
    fn test_parse_filters() {
        let filters = parse_filters(&["id:eq:5".into()]).unwrap();
        assert_eq!(filters, vec![Filter::new("id", FilterOp::Eq, "5")]);
        assert!(parse_filters(&["id:nope:5".into()]).is_err());
    }

    #[test]
    fn test_merge_connection() {
        let saved = Connection::new("saved", "saved-key", Some("api"), Some("saved-jwt"));

        let merged = merge_connection(&ConnectionArgs::default(), saved.clone());
        assert_eq!(merged, saved);

        let args = ConnectionArgs {
            api_key: Some("new-key".into()),
            ..Default::default()
        };
        let merged = merge_connection(&args, saved.clone());
        assert_eq!(merged.project_id, "saved");
        assert_eq!(merged.schema, "api");
        assert_eq!(merged.bearer, "new-key");

        let args = ConnectionArgs {
            project_id: Some("other".into()),
            bearer: Some("jwt".into()),
            ..Default::default()
        };
        let merged = merge_connection(&args, saved);
        assert_eq!(merged.project_id, "other");
        assert_eq!(merged.bearer, "jwt");
    }

    #[tokio::test]
    async fn test_resolve_connection_requires_credentials() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = resolve_connection(&ConnectionArgs::default(), &store).await.unwrap_err();
        assert!(err.to_string().starts_with("No connection."));

        let args = ConnectionArgs {
            project_id: Some("abc".into()),
            api_key: Some("k".into()),
            ..Default::default()
        };
        let connection = resolve_connection(&args, &store).await.unwrap();
        assert_eq!(connection.schema, "public");
    }
}
