//! Row inserts, updates and deletes.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use serde_json::Value;

use supahack_core::client::{Filter, RestClient};

use crate::cli::ConnectionArgs;
use crate::commands::{open_store, parse_assignments, parse_filters, resolve_connection, rest_client};
use crate::config::Config;

pub async fn insert(args: &ConnectionArgs, table: &str, values: &[String], config: &Config) -> Result<()> {
    let client = connect(args, config).await?;
    let rows = insert_row(&client, table, values).await?;
    report("Inserted", table, &rows)
}

pub async fn update(
    args: &ConnectionArgs,
    table: &str,
    filters: &[String],
    values: &[String],
    yes: bool,
    config: &Config,
) -> Result<()> {
    let filters = parse_filters(filters)?;
    let patch = Value::Object(parse_assignments(values)?);
    if !yes && !confirm(&format!("Update rows in {} where {}?", table, describe(&filters)))? {
        println!("Cancelled.");
        return Ok(());
    }

    let client = connect(args, config).await?;
    let rows = client.update_rows(table, &filters, &patch).await?;
    report("Updated", table, &rows)
}

pub async fn delete(
    args: &ConnectionArgs,
    table: &str,
    filters: &[String],
    yes: bool,
    config: &Config,
) -> Result<()> {
    let filters = parse_filters(filters)?;
    if !yes && !confirm(&format!("Delete rows from {} where {}?", table, describe(&filters)))? {
        println!("Cancelled.");
        return Ok(());
    }

    let client = connect(args, config).await?;
    let rows = client.delete_rows(table, &filters).await?;
    report("Deleted", table, &rows)
}

async fn connect(args: &ConnectionArgs, config: &Config) -> Result<RestClient> {
    let store = open_store(config)?;
    let connection = resolve_connection(args, &store).await?;
    rest_client(config, &connection)
}

async fn insert_row(client: &RestClient, table: &str, values: &[String]) -> Result<Vec<Value>> {
    let row = Value::Object(parse_assignments(values)?);
    Ok(client.insert_row(table, &row).await?)
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn describe(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(|f| format!("{} {} {}", f.column, f.op, f.value))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn report(action: &str, table: &str, rows: &[Value]) -> Result<()> {
    let noun = if rows.len() == 1 { "row" } else { "rows" };
    println!("{}", format!("✓ {} {} {} in {}", action, rows.len(), noun, table).green());
    if !rows.is_empty() {
        println!("{}", serde_json::to_string_pretty(rows)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use supahack_core::client::{FilterOp, RestEndpoint};
    use supahack_core::Connection;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> RestClient {
        let connection = Connection::new("abcd", "anon", None, None);
        RestClient::new(&connection, &RestEndpoint::Fixed(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_insert_coerces_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/todos"))
            .and(body_json(json!({"title": "Write docs", "done": false, "priority": 2})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let rows = insert_row(
            &client,
            "todos",
            &["title=Write docs".into(), "done=false".into(), "priority=2".into()],
        )
        .await
        .unwrap();
        assert_eq!(rows, vec![json!({"id": 1})]);
    }

    #[tokio::test]
    async fn test_insert_rejects_bad_assignment() {
        let server = MockServer::start().await;
        let client = client(&server).await;
        assert!(insert_row(&client, "todos", &["title".into()]).await.is_err());
    }

    #[test]
    fn test_describe_filters() {
        let filters = vec![
            Filter::new("id", FilterOp::Eq, "5"),
            Filter::new("status", FilterOp::In, "a,b"),
        ];
        assert_eq!(describe(&filters), "id eq 5 and status in a,b");
    }
}
