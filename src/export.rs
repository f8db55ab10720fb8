use crate::db::{CellValue, QueryResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Header line followed by one tab-separated line per row.
pub fn to_tsv(result: &QueryResult) -> String {
    let mut output = result.columns.join("\t");
    output.push('\n');

    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(|cell| tsv_escape(&cell.display())).collect();
        output.push_str(&cells.join("\t"));
        output.push('\n');
    }

    output
}

#[derive(Serialize)]
struct JsonResult<'a> {
    columns: &'a [String],
    rows: Vec<serde_json::Value>,
    message: &'a str,
    execution_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    affected_rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_insert_id: Option<u64>,
    executed_at: DateTime<Utc>,
}

/// Pretty JSON with one object per row, keyed by column name.
pub fn to_json(result: &QueryResult, executed_at: DateTime<Utc>) -> String {
    let rows = result
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, cell) in row.iter().enumerate() {
                let col_name = result
                    .columns
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i));
                obj.insert(col_name, cell_to_json(cell));
            }
            serde_json::Value::Object(obj)
        })
        .collect();

    let json = JsonResult {
        columns: &result.columns,
        rows,
        message: &result.message,
        execution_ms: result.execution_time.as_secs_f64() * 1000.0,
        affected_rows: result.affected_rows,
        last_insert_id: result.last_insert_id,
        executed_at,
    };
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}

/// Decimals stay strings so their scale survives.
fn cell_to_json(cell: &CellValue) -> serde_json::Value {
    match cell {
        CellValue::Null => serde_json::Value::Null,
        CellValue::Int(i) => serde_json::json!(*i),
        CellValue::UInt(u) => serde_json::json!(*u),
        CellValue::Float(f) => serde_json::json!(*f),
        other => serde_json::Value::String(other.display()),
    }
}

fn tsv_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}
