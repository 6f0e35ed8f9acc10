//! Agent Pipeline - Planner → Selector → Generator → Executor
//!
//! Each stage takes the `PipelineState` by value and hands it back together
//! with its outcome. The driver in `pipeline` owns the retry loop.

pub mod contracts;
pub mod executor;
pub mod explain;
pub mod generator;
pub mod pipeline;
pub mod planner;
pub mod selector;
pub mod service;
pub mod state;

pub use contracts::{
    ActionKind, FilterSpec, Phase, PipelineSnapshot, Plan, PlanStep, SelectedField, Status,
    TraceEvent, TraceEventType,
};
pub use executor::Executor;
pub use explain::Explainer;
pub use generator::{extract_query, GenerationContext, Generator};
pub use pipeline::Pipeline;
pub use planner::{parse_plan, Planner};
pub use selector::{extract_field_names, rank_fields, Selector};
pub use service::AgentService;
pub use state::PipelineState;

use crate::error::{AgentError, Result};
use std::future::Future;
use std::time::Duration;

/// Await `fut` for at most `limit`; expiry becomes a `Timeout` for `stage`.
pub(crate) async fn bounded<T, F>(stage: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::timeout(stage, limit)),
    }
}
