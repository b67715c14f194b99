//! Paged row reads.

use anyhow::Result;
use colored::Colorize;
use serde_json::Value;

use supahack_core::client::{RowQuery, SortDirection};

use crate::cli::{ConnectionArgs, RowsArgs};
use crate::commands::{open_store, parse_filters, resolve_connection, rest_client};
use crate::config::Config;

/// Widest cell printed in table output.
const MAX_CELL_WIDTH: usize = 40;

pub async fn execute(args: RowsArgs, conn: &ConnectionArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let connection = resolve_connection(conn, &store).await?;
    let client = rest_client(config, &connection)?;

    let query = build_query(&args, config.display.page_size)?;
    let page = client.fetch_rows(&args.table, &query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page.rows)?);
        return Ok(());
    }

    if page.rows.is_empty() {
        println!("{}", "No rows.".yellow());
    } else {
        print_rows(&page.rows);
    }

    let first = query.offset() + 1;
    let last = query.offset() + page.rows.len() as u64;
    let summary = match page.total {
        Some(total) if !page.rows.is_empty() => format!("Rows {}-{} of {}", first, last, total),
        Some(total) => format!("Page {} is past the end ({} rows)", query.page, total),
        None => format!("Page {} ({} rows)", query.page, page.rows.len()),
    };
    println!();
    println!("{}", summary.dimmed());
    Ok(())
}

fn build_query(args: &RowsArgs, default_page_size: u32) -> Result<RowQuery> {
    Ok(RowQuery {
        columns: args
            .columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        page_size: args.limit.unwrap_or(default_page_size).max(1),
        page: args.page,
        order: args.order.clone().map(|column| {
            let direction = if args.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            (column, direction)
        }),
        filters: parse_filters(&args.filters)?,
    })
}

/// Column order of the first row, then any columns later rows add.
fn collect_columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn format_cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let truncated: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{}…", truncated)
    } else {
        text
    }
}

fn print_rows(rows: &[Value]) {
    let columns = collect_columns(rows);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| format_cell(row.get(c))).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    println!("{}", header.join("  ").cyan().bold());
    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect();
        println!("{}", line.join("  "));
    }
}
