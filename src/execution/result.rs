//! Query Result - rows returned by a dataset engine

use crate::error::{AgentError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One result record: field name to scalar.
pub type Record = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order
    pub columns: Vec<String>,

    /// Records in result order
    pub rows: Vec<Record>,

    pub row_count: usize,

    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Record>, execution_time_ms: u64) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }

    /// Convert a collected frame into records.
    pub fn from_dataframe(df: &DataFrame, execution_time_ms: u64) -> Result<Self> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = Vec::with_capacity(df.height());

        for row_idx in 0..df.height() {
            let mut row = Record::with_capacity(columns.len());
            for col_name in &columns {
                let series = df.column(col_name)?;
                row.insert(col_name.clone(), series_to_json_value(series, row_idx)?);
            }
            rows.push(row);
        }

        Ok(Self::new(columns, rows, execution_time_ms))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The single value of a one-row, one-column result.
    pub fn scalar(&self) -> Option<&serde_json::Value> {
        if self.rows.len() == 1 && self.columns.len() == 1 {
            self.rows[0].get(&self.columns[0])
        } else {
            None
        }
    }

    /// Render the first `limit` rows as a pipe-separated text table.
    pub fn render_table(&self, limit: usize) -> String {
        let mut lines = Vec::with_capacity(limit.min(self.rows.len()) + 1);
        lines.push(self.columns.join(" | "));
        for row in self.rows.iter().take(limit) {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| row.get(c).map(display_value).unwrap_or_default())
                .collect();
            lines.push(cells.join(" | "));
        }
        lines.join("\n")
    }
}

/// Human form of a scalar: strings without quotes, null as `NULL`.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn series_to_json_value(series: &Series, row_idx: usize) -> Result<serde_json::Value> {
    let any_val = series
        .get(row_idx)
        .map_err(|e| AgentError::Execution(format!("Failed to get value: {}", e)))?;

    if any_val.is_null() {
        return Ok(serde_json::Value::Null);
    }

    let value = match any_val {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(b),
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        AnyValue::Int8(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int16(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int32(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int64(i) => serde_json::Value::Number(i.into()),
        AnyValue::UInt8(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt16(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt32(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt64(u) => serde_json::Value::Number(u.into()),
        AnyValue::Float32(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AnyValue::Float64(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        other => serde_json::Value::String(other.to_string().trim_matches('"').to_string()),
    };
    Ok(value)
}
