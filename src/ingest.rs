//! Dataset Ingestion
//!
//! Loads the dataset file and normalises it before it is registered for SQL.

use crate::error::{AgentError, Result};
use crate::schema::clean_field_name;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Load a CSV (default) or Parquet file and clean it.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AgentError::Dataset(format!("Data file not found: {}", path.display())));
    }

    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false);

    let lf = if is_parquet {
        LazyFrame::scan_parquet(path, ScanArgsParquet::default())
            .map_err(|e| AgentError::Dataset(format!("Failed to load Parquet: {}", e)))?
    } else {
        LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()
            .map_err(|e| AgentError::Dataset(format!("Failed to load CSV: {}", e)))?
    };

    let df = lf
        .collect()
        .map_err(|e| AgentError::Dataset(format!("Failed to read {}: {}", path.display(), e)))?;
    let df = clean_dataframe(df)?;

    info!("Loaded {} rows with {} columns", df.height(), df.width());
    Ok(df)
}

/// Trim column names, replace inner spaces with `_`, and turn literal
/// `"NULL"` strings into real nulls.
pub fn clean_dataframe(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| clean_field_name(n))
        .collect();
    df.set_column_names(names.as_slice())?;

    let null_fixes: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|s| s.dtype() == &DataType::String)
        .map(|s| {
            let name = s.name();
            when(col(name).eq(lit("NULL")))
                .then(lit(NULL).cast(DataType::String))
                .otherwise(col(name))
                .alias(name)
        })
        .collect();

    if null_fixes.is_empty() {
        return Ok(df);
    }

    Ok(df.lazy().with_columns(null_fixes).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_dataframe_names_and_nulls() {
        let df = df![
            " Anonymous Uid " => ["E5F99", "E5F86"],
            "Drugname" => ["NULL", "Timolol"]
        ]
        .unwrap();

        let cleaned = clean_dataframe(df).unwrap();
        assert_eq!(cleaned.get_column_names(), vec!["Anonymous_Uid", "Drugname"]);
        let drug = cleaned.column("Drugname").unwrap();
        assert_eq!(drug.null_count(), 1);
        assert_eq!(drug.str().unwrap().get(1), Some("Timolol"));
    }

    #[test]
    fn test_load_csv_from_disk() {
        let dir = std::env::temp_dir().join(format!("aurorag-ingest-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("patients.csv");
        std::fs::write(&path, "Anonymous Uid,DiagnosisName\nE5F99,Glaucoma\nE5F86,NULL\n").unwrap();

        let df = load_dataset(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names(), vec!["Anonymous_Uid", "DiagnosisName"]);
        assert_eq!(df.column("DiagnosisName").unwrap().null_count(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = load_dataset("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, AgentError::Dataset(_)));
    }
}
