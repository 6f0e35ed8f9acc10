//! Polars Execution Engine
//!
//! Runs SQL against the in-memory dataset through Polars' SQL context.

use crate::error::{AgentError, Result};
use crate::execution::engine::{DatasetEngine, DatasetStats};
use crate::execution::result::QueryResult;
use crate::ingest;
use async_trait::async_trait;
use polars::prelude::*;
use polars::sql::SQLContext;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

pub struct PolarsEngine {
    table_name: String,
    frame: DataFrame,
}

impl PolarsEngine {
    pub fn new(table_name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            table_name: table_name.into(),
            frame,
        }
    }

    /// Load and clean a CSV or Parquet file, registering it under `table_name`.
    pub fn from_path(table_name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let frame = ingest::load_dataset(path)?;
        Ok(Self::new(table_name, frame))
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }
}

#[async_trait]
impl DatasetEngine for PolarsEngine {
    fn name(&self) -> &'static str {
        "polars"
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let start_time = Instant::now();
        debug!("Executing query with Polars: {}", sql);

        // fresh SQL context per call over a cheap clone of the frame
        let table = self.table_name.clone();
        let frame = self.frame.clone();
        let sql = sql.to_string();
        let df = tokio::task::spawn_blocking(move || run_sql(&table, frame, &sql))
            .await
            .map_err(|e| AgentError::Execution(format!("Query task failed: {}", e)))??;

        let execution_time = start_time.elapsed().as_millis() as u64;
        info!("✅ Query completed in {}ms, returned {} rows", execution_time, df.height());

        QueryResult::from_dataframe(&df, execution_time)
    }

    fn stats(&self) -> DatasetStats {
        DatasetStats {
            tables: 1,
            rows: self.frame.height(),
            columns: self.frame.width(),
        }
    }
}

fn run_sql(table: &str, frame: DataFrame, sql: &str) -> Result<DataFrame> {
    let mut ctx = SQLContext::new();
    ctx.register(table, frame.lazy());
    ctx.execute(sql)
        .and_then(|lf| lf.collect())
        .map_err(|e| AgentError::Execution(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> PolarsEngine {
        let df = df![
            "Anonymous_Uid" => ["E5F99", "E5F86", "E6A01"],
            "DiagnosisName" => ["Glaucoma;Hypertension", "Diabetic Retinopathy", "Glaucoma"],
            "Drugname" => ["Timolol", "Ranibizumab", "Latanoprost"]
        ]
        .unwrap();
        PolarsEngine::new("patient_data", df)
    }

    #[tokio::test]
    async fn test_count_with_like() {
        let engine = engine();
        let result = engine
            .execute("SELECT COUNT(*) AS patient_count FROM patient_data WHERE DiagnosisName LIKE '%Glaucoma%'")
            .await
            .unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.scalar(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_unknown_column_is_execution_error() {
        let engine = engine();
        let err = engine
            .execute("SELECT PatientID FROM patient_data")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Execution(_)));
    }

    #[tokio::test]
    async fn test_unknown_table_is_execution_error() {
        let engine = engine();
        let err = engine.execute("SELECT * FROM patients").await.unwrap_err();
        assert!(matches!(err, AgentError::Execution(_)));
    }

    #[test]
    fn test_stats() {
        let stats = engine().stats();
        assert_eq!(stats, DatasetStats { tables: 1, rows: 3, columns: 3 });
    }
}
