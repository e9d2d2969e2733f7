//! Ad-hoc read queries against the index.
//!
//! The statement is passed to the store verbatim; engine errors (syntax,
//! unknown column) are surfaced unchanged.

use std::str::FromStr;

use crate::error::Result;
use crate::models::ResultSet;
use crate::store::FileStore;

/// Output format for query results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}': expected table or json",
                other
            )),
        }
    }
}

/// Run `sql` against `store` and render the result.
pub async fn run_query(store: &dyn FileStore, sql: &str, format: OutputFormat) -> Result<String> {
    let rs = store.query(sql).await?;
    tracing::debug!(rows = rs.row_count(), "query returned");

    Ok(match format {
        OutputFormat::Table => render_table(&rs),
        OutputFormat::Json => render_json(&rs),
    })
}

/// Render column headers, a rule, then one line per row.
///
/// Columns are left-aligned and padded to their widest value.
pub fn render_table(rs: &ResultSet) -> String {
    let cells: Vec<Vec<String>> = rs
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = rs.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    push_line(&mut out, &rs.columns, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

fn render_json(rs: &ResultSet) -> String {
    serde_json::to_string_pretty(rs).unwrap_or_else(|_| "{}".to_string())
}
