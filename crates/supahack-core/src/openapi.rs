//! Table and column discovery from the PostgREST OpenAPI document.

use serde_json::Value;
use std::collections::BTreeSet;

/// Table names from the document's top-level paths.
///
/// `/rpc/*` functions and nested paths such as `/orders/{id}` are skipped.
pub fn parse_tables_from_openapi(openapi: &Value) -> Vec<String> {
    let Some(paths) = openapi.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let names: BTreeSet<String> = paths
        .keys()
        .filter(|path| path.starts_with('/') && !path.starts_with("/rpc/"))
        .filter_map(|path| {
            let segment = path.split('?').next().unwrap_or_default();
            let segment = segment.strip_prefix('/').unwrap_or(segment);
            if segment.is_empty() || segment.contains('/') {
                None
            } else {
                Some(segment.to_string())
            }
        })
        .collect();

    names.into_iter().collect()
}

/// Column names declared for a table in `components.schemas` (or the
/// Swagger 2 `definitions` PostgREST emits by default).
///
/// Returns `None` when no candidate definition has properties.
pub fn extract_columns_from_openapi(openapi: &Value, table: &str, schema: &str) -> Option<Vec<String>> {
    let definitions = openapi
        .pointer("/components/schemas")
        .or_else(|| openapi.get("definitions"))
        .and_then(Value::as_object)?;

    let candidates = [
        format!("{}_{}", schema, table),
        table.to_string(),
        format!("{}.{}", schema, table),
        format!("{}_insert", table),
        format!("{}_update", table),
    ];

    let columns: BTreeSet<String> = candidates
        .iter()
        .filter_map(|name| definitions.get(name))
        .filter_map(|def| def.get("properties").and_then(Value::as_object))
        .flat_map(|props| props.keys().cloned())
        .collect();

    if columns.is_empty() {
        None
    } else {
        Some(columns.into_iter().collect())
    }
}

/// Column names seen across a sample of rows.
pub fn infer_columns_from_rows(rows: &[Value]) -> Option<Vec<String>> {
    let columns: BTreeSet<String> = rows
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|row| row.keys().cloned())
        .collect();
    if columns.is_empty() {
        None
    } else {
        Some(columns.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tables_skips_rpc_and_nested_paths() {
        let doc = json!({
            "paths": {
                "/users": {},
                "/rpc/do_thing": {},
                "/orders/{id}": {}
            }
        });
        assert_eq!(parse_tables_from_openapi(&doc), vec!["users".to_string()]);
    }

    #[test]
    fn test_parse_tables_sorted_and_deduplicated() {
        let doc = json!({
            "paths": {
                "/": {},
                "/zebra": {},
                "/alpha?select=*": {},
                "/alpha": {},
                "relative": {}
            }
        });
        assert_eq!(parse_tables_from_openapi(&doc), vec!["alpha", "zebra"]);
        assert!(parse_tables_from_openapi(&json!({})).is_empty());
        assert!(parse_tables_from_openapi(&json!({ "paths": null })).is_empty());
    }

    #[test]
    fn test_extract_columns_merges_candidates() {
        let doc = json!({
            "components": {
                "schemas": {
                    "users": { "properties": { "id": {}, "email": {} } },
                    "users_insert": { "properties": { "id": {}, "name": {} } },
                    "orders": { "properties": { "total": {} } }
                }
            }
        });
        assert_eq!(
            extract_columns_from_openapi(&doc, "users", "public"),
            Some(vec!["email".to_string(), "id".to_string(), "name".to_string()])
        );
        assert_eq!(extract_columns_from_openapi(&doc, "missing", "public"), None);
    }

    #[test]
    fn test_extract_columns_from_swagger_definitions() {
        let doc = json!({
            "definitions": {
                "public.users": { "properties": { "id": {} } }
            }
        });
        assert_eq!(
            extract_columns_from_openapi(&doc, "users", "public"),
            Some(vec!["id".to_string()])
        );
    }

    #[test]
    fn test_infer_columns_from_rows() {
        let rows = vec![json!({ "b": 1, "a": 2 }), json!({ "c": null }), json!(5)];
        assert_eq!(
            infer_columns_from_rows(&rows),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(infer_columns_from_rows(&[]), None);
    }
}
