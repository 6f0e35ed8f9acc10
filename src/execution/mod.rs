//! Execution Module - read-only query execution over the dataset
//!
//! - DatasetEngine trait for the execution capability
//! - PolarsEngine over an in-memory frame
//! - QueryResult as the row format handed back to the pipeline

pub mod engine;
pub mod polars_engine;
pub mod result;

pub use engine::{DatasetEngine, DatasetStats};
pub use polars_engine::PolarsEngine;
pub use result::{display_value, QueryResult, Record};
