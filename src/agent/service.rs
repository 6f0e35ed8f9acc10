//! Agent Service - owns the shared collaborators and answers questions
//!
//! Catalog, dataset engine and completion backend are read-only and shared
//! behind `Arc`; every question gets its own `PipelineState`, so `ask` can be
//! called concurrently.

use crate::agent::contracts::PipelineSnapshot;
use crate::agent::pipeline::{budget_exceeded, Pipeline};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::execution::{DatasetEngine, DatasetStats, PolarsEngine};
use crate::llm::{CompletionBackend, LlmClient};
use crate::schema::SchemaCatalog;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub struct AgentService {
    pipeline: Pipeline,
    engine: Arc<dyn DatasetEngine>,
    catalog: Arc<SchemaCatalog>,
    budget: Duration,
}

impl AgentService {
    pub fn new(
        config: &AgentConfig,
        catalog: Arc<SchemaCatalog>,
        engine: Arc<dyn DatasetEngine>,
        llm: Arc<dyn CompletionBackend>,
    ) -> Result<Self> {
        config.validate()?;
        if engine.table_name() != config.table_name {
            return Err(AgentError::Config(format!(
                "engine serves table '{}' but config names '{}'",
                engine.table_name(),
                config.table_name
            )));
        }

        Ok(Self {
            pipeline: Pipeline::new(config, catalog.clone(), engine.clone(), llm),
            engine,
            catalog,
            budget: config.question_budget(),
        })
    }

    /// Load the dataset and catalog from disk and connect to the configured endpoint.
    pub fn from_config(
        config: &AgentConfig,
        data_path: impl AsRef<Path>,
        schema_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let catalog = SchemaCatalog::load(schema_path)?;
        let engine = PolarsEngine::from_path(config.table_name.clone(), data_path)?;

        let dataset_columns: Vec<String> = engine
            .frame()
            .get_column_names()
            .iter()
            .map(|c| c.to_lowercase())
            .collect();
        let undescribed: Vec<&str> = catalog
            .field_names()
            .into_iter()
            .filter(|name| !dataset_columns.contains(&name.to_lowercase()))
            .collect();
        if !undescribed.is_empty() {
            warn!(
                "{} catalog fields are not in the dataset: {}",
                undescribed.len(),
                undescribed.join(", ")
            );
        }

        let llm = LlmClient::from_config(config)?;
        info!(
            "Loaded {} catalog fields, {} rows; model {}",
            catalog.len(),
            engine.frame().height(),
            llm.model()
        );

        Self::new(config, Arc::new(catalog), Arc::new(engine), Arc::new(llm))
    }

    /// Answer one question within the wall-clock budget.
    pub async fn ask(&self, question: &str) -> PipelineSnapshot {
        let run_id = Uuid::new_v4();
        match tokio::time::timeout(self.budget, self.pipeline.run(question, run_id)).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!("Question {} abandoned after {}s", run_id, self.budget.as_secs());
                budget_exceeded(question, run_id, AgentError::timeout("pipeline", self.budget))
            }
        }
    }

    pub fn stats(&self) -> DatasetStats {
        self.engine.stats()
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }
}
