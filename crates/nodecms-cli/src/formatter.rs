//! Output formatters for repository results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde_json::Value as JsonValue;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render serialized entities.
pub fn format_rows(format: OutputFormat, rows: &[JsonValue]) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Table => rows_as_table(rows),
    }
}

/// Render a page of entities with its position in the full result.
pub fn format_page(
    format: OutputFormat,
    rows: &[JsonValue],
    total: u64,
    page: usize,
    page_count: usize,
) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "items": rows,
            "total": total,
            "page": page,
            "pageCount": page_count,
        }))
        .unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Table => format!(
            "{}\npage {} of {} ({} total)",
            rows_as_table(rows),
            page,
            page_count,
            total
        ),
    }
}

/// Render a single count.
pub fn format_count(format: OutputFormat, count: u64) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({ "count": count }).to_string(),
        OutputFormat::Table => format!("{} row(s)", count),
    }
}

/// Render a short status message.
pub fn format_message(format: OutputFormat, message: &str) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({ "message": message }).to_string(),
        OutputFormat::Table => message.to_string(),
    }
}

fn rows_as_table(rows: &[JsonValue]) -> String {
    let Some(JsonValue::Object(first)) = rows.first() else {
        return "No results".to_string();
    };
    let columns: Vec<&String> = first.keys().collect();

    let mut table = Table::new();
    table.set_header(columns.iter().map(|c| Cell::new(c)));
    for row in rows {
        table.add_row(
            columns
                .iter()
                .map(|column| Cell::new(cell_text(row.get(column.as_str())))),
        );
    }
    table.to_string()
}

fn cell_text(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => "NULL".to_string(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_uses_first_row_columns() {
        let rows = vec![
            serde_json::json!({ "id": 1, "node_name": "home", "parent_id": null }),
            serde_json::json!({ "id": 2, "node_name": "about", "parent_id": 1 }),
        ];
        let table = format_rows(OutputFormat::Table, &rows);
        assert!(table.contains("node_name"));
        assert!(table.contains("about"));
        assert!(table.contains("NULL"));
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(format_rows(OutputFormat::Table, &[]), "No results");
        assert_eq!(format_rows(OutputFormat::Json, &[]), "[]");
    }

    #[test]
    fn test_count_formats() {
        assert_eq!(format_count(OutputFormat::Json, 3), r#"{"count":3}"#);
        assert_eq!(format_count(OutputFormat::Table, 3), "3 row(s)");
    }
}
