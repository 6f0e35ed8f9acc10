//! Pipeline Driver
//!
//! Planner and Selector run once; Generator and Executor loop until the
//! Executor reaches a terminal status. The Generator counts every attempt, so
//! the loop ends after at most `MAX_ATTEMPTS` turns.

use crate::agent::contracts::{PipelineSnapshot, Status, TraceEventType};
use crate::agent::executor::Executor;
use crate::agent::explain::{fatal_explanation, Explainer};
use crate::agent::generator::{GenerationContext, Generator};
use crate::agent::planner::Planner;
use crate::agent::selector::Selector;
use crate::agent::state::PipelineState;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::execution::DatasetEngine;
use crate::llm::CompletionBackend;
use crate::schema::SchemaCatalog;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Phase reported when the question budget runs out, whatever stage was active.
pub const BUDGET_PHASE: &str = "pipeline";

pub struct Pipeline {
    planner: Planner,
    selector: Selector,
    generator: Generator,
    executor: Executor,
}

impl Pipeline {
    pub fn new(
        config: &AgentConfig,
        catalog: Arc<SchemaCatalog>,
        engine: Arc<dyn DatasetEngine>,
        llm: Arc<dyn CompletionBackend>,
    ) -> Self {
        let llm_timeout = config.llm_timeout();
        Self {
            planner: Planner::new(llm.clone(), llm_timeout),
            selector: Selector::new(llm.clone(), catalog.clone(), llm_timeout),
            generator: Generator::new(
                llm.clone(),
                catalog,
                GenerationContext::from_config(config),
                llm_timeout,
            ),
            executor: Executor::new(
                engine,
                Explainer::new(llm, llm_timeout),
                config.execution_timeout(),
            ),
        }
    }

    /// Answer one question under the caller's run id. Never fails: every
    /// outcome is a terminal snapshot.
    pub async fn run(&self, question: &str, run_id: Uuid) -> PipelineSnapshot {
        let state = PipelineState::with_run_id(question, run_id);
        let span = info_span!("pipeline", run_id = %state.run_id());
        self.drive(state).instrument(span).await.into_snapshot()
    }

    async fn drive(&self, state: PipelineState) -> PipelineState {
        info!("Question: {}", state.question());

        let (state, outcome) = self.planner.plan(state).await;
        if let Err(e) = outcome {
            return abort(state, e);
        }

        let (state, outcome) = self.selector.select(state).await;
        if let Err(e) = outcome {
            return abort(state, e);
        }

        let mut state = state;
        loop {
            let (next, candidate) = self.generator.generate(state).await;
            let candidate = match candidate {
                Err(e @ AgentError::StateInvariant(_)) => return abort(next, e),
                other => other,
            };

            state = self.executor.step(next, candidate).await;
            if state.status().is_terminal() {
                break;
            }
        }

        info!(
            "Pipeline finished: {} after {} attempt(s)",
            state.status(),
            state.attempt_count()
        );
        state
    }
}

/// Terminate on a non-retryable error.
fn abort(state: PipelineState, error: AgentError) -> PipelineState {
    let phase = state.phase();
    terminate(state, phase.as_str(), error)
}

fn terminate(mut state: PipelineState, phase: &str, error: AgentError) -> PipelineState {
    error!("Pipeline stopped in {}: {}", phase, error);
    state.record_failure(&error);
    state.set_explanation(fatal_explanation(&error));
    state.push_trace(
        TraceEventType::Error,
        json!({
            "phase": phase,
            "error": error.to_string(),
            "error_kind": error.kind(),
        }),
    );
    state.finish(Status::FailedTerminal);
    state
}

/// Snapshot for a run abandoned at the question budget.
///
/// The in-flight state is dropped with the cancelled future; only the run id
/// survives.
pub(crate) fn budget_exceeded(question: &str, run_id: Uuid, error: AgentError) -> PipelineSnapshot {
    let state = PipelineState::with_run_id(question, run_id);
    let mut snapshot = terminate(state, BUDGET_PHASE, error).into_snapshot();
    snapshot.terminal_phase = BUDGET_PHASE.to_string();
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_budget_snapshot_keeps_run_id() {
        let run_id = Uuid::new_v4();
        let snapshot = budget_exceeded(
            "How many patients have Glaucoma?",
            run_id,
            AgentError::timeout("pipeline", Duration::from_secs(1)),
        );

        assert_eq!(snapshot.run_id, run_id.to_string());
        assert_eq!(snapshot.terminal_phase, "pipeline");
        assert_eq!(snapshot.status, Status::FailedTerminal);
        assert_eq!(snapshot.error_kind.as_deref(), Some("TimeoutError"));
        assert_eq!(snapshot.attempt_count, 0);
        let last = snapshot.trace.last().unwrap();
        assert_eq!(last.event_type, TraceEventType::Error);
        assert_eq!(last.payload["phase"], json!("pipeline"));
    }
}
