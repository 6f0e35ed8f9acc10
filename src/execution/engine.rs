//! Dataset Engine Trait - the query-execution capability the pipeline runs against

use crate::error::Result;
use crate::execution::result::QueryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Counts for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub tables: usize,
    pub rows: usize,
    pub columns: usize,
}

/// Read-only query execution over the fixed dataset.
///
/// Implementations must tolerate concurrent `execute` calls from independent
/// pipeline runs.
#[async_trait]
pub trait DatasetEngine: Send + Sync {
    /// Engine name (e.g., "polars")
    fn name(&self) -> &'static str;

    /// Relation name queries must target
    fn table_name(&self) -> &str;

    /// Execute SQL query
    async fn execute(&self, sql: &str) -> Result<QueryResult>;

    fn stats(&self) -> DatasetStats;
}
