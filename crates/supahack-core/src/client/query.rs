//! PostgREST query parameters for table reads and writes.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Horizontal filter operators understood by PostgREST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Ilike,
    Like,
    Is,
    In,
    Cs,
    Cd,
}

impl FilterOp {
    pub const ALL: [FilterOp; 12] = [
        FilterOp::Eq,
        FilterOp::Neq,
        FilterOp::Gt,
        FilterOp::Gte,
        FilterOp::Lt,
        FilterOp::Lte,
        FilterOp::Ilike,
        FilterOp::Like,
        FilterOp::Is,
        FilterOp::In,
        FilterOp::Cs,
        FilterOp::Cd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Ilike => "ilike",
            FilterOp::Like => "like",
            FilterOp::Is => "is",
            FilterOp::In => "in",
            FilterOp::Cs => "cs",
            FilterOp::Cd => "cd",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        FilterOp::ALL
            .into_iter()
            .find(|op| op.as_str() == lower)
            .ok_or_else(|| Error::Other(format!("Unknown filter operator: {}", s)))
    }
}

/// `<column>=<op>.<value>` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Parse `column:op:value` (the value may itself contain colons).
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut parts = input.splitn(3, ':');
        let column = parts.next().unwrap_or_default().trim();
        let op = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        if column.is_empty() || op.is_empty() {
            return Err(Error::Other(format!(
                "Invalid filter '{}', expected column:op:value",
                input
            )));
        }
        Ok(Self::new(column, op.parse()?, value))
    }

    /// Query pair, or `None` when the value is empty for an operator that
    /// needs one.
    pub fn to_param(&self) -> Option<(String, String)> {
        let value = self.value.trim();
        if value.is_empty() && self.op != FilterOp::Is {
            return None;
        }
        let value = if self.op == FilterOp::In && !(value.starts_with('(') && value.ends_with(')')) {
            format!("({})", value)
        } else {
            value.to_string()
        };
        Some((self.column.clone(), format!("{}.{}", self.op, value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Parameters for a paged table read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    /// Columns to select; empty selects `*`.
    pub columns: Vec<String>,
    pub page_size: u32,
    /// 1-based page number.
    pub page: u32,
    pub order: Option<(String, SortDirection)>,
    pub filters: Vec<Filter>,
}

impl Default for RowQuery {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            page_size: 100,
            page: 1,
            order: None,
            filters: Vec::new(),
        }
    }
}

impl RowQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }

    fn select(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        }
    }

    /// Filter pairs only (used for updates, deletes and counts).
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.iter().filter_map(Filter::to_param).collect()
    }

    /// Full query string pairs.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("select".to_string(), self.select()),
            ("limit".to_string(), self.page_size.to_string()),
            ("offset".to_string(), self.offset().to_string()),
        ];
        if let Some((column, direction)) = &self.order {
            params.push(("order".to_string(), format!("{}.{}", column, direction.as_str())));
        }
        params.extend(self.filter_params());
        params
    }
}

/// Turn free-form input into a JSON value the way the explorer forms do:
/// booleans, integers, decimals, then plain strings.
pub fn coerce_input_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower == "true" || lower == "false" {
        return Value::Bool(lower == "true");
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        // Integers past i64 would lose digits as floats
        return match trimmed.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(trimmed.to_string()),
        };
    }
    let without_dots: String = trimmed.chars().filter(|c| *c != '.').collect();
    if !without_dots.is_empty() && without_dots.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::from(f);
        }
    }
    Value::String(trimmed.to_string())
}
