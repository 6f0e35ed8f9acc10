//! Executor - runs the candidate query and decides RUNNING / SUCCESS / FAILED_TERMINAL

use crate::agent::bounded;
use crate::agent::contracts::{Phase, Status, TraceEventType};
use crate::agent::explain::{failure_explanation, fallback_explanation, Explainer};
use crate::agent::state::PipelineState;
use crate::config::MAX_ATTEMPTS;
use crate::error::{AgentError, Result};
use crate::execution::{DatasetEngine, QueryResult};
use crate::execution_loop::ErrorClassifier;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Executor {
    engine: Arc<dyn DatasetEngine>,
    explainer: Explainer,
    classifier: ErrorClassifier,
    timeout: Duration,
}

impl Executor {
    pub fn new(engine: Arc<dyn DatasetEngine>, explainer: Explainer, timeout: Duration) -> Self {
        Self {
            engine,
            explainer,
            classifier: ErrorClassifier::new(),
            timeout,
        }
    }

    /// Advance the state machine by one attempt.
    ///
    /// `candidate` is the Generator's outcome; a generation failure is handled
    /// exactly like an execution failure.
    pub async fn step(&self, mut state: PipelineState, candidate: Result<String>) -> PipelineState {
        state.enter(Phase::Executor);

        let outcome = match candidate {
            Ok(sql) => self.execute(&sql).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => self.succeed(state, result).await,
            Err(e) => self.fail(state, e),
        }
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        info!("Executing SQL on {}: {}", self.engine.name(), sql);
        bounded("executor", self.timeout, self.engine.execute(sql)).await
    }

    async fn succeed(&self, mut state: PipelineState, result: QueryResult) -> PipelineState {
        info!("✅ Attempt {} returned {} rows", state.attempt_count(), result.row_count);
        state.push_trace(
            TraceEventType::Execution,
            json!({
                "attempt": state.attempt_count(),
                "rows": result.row_count,
                "execution_time_ms": result.execution_time_ms,
            }),
        );
        state.record_success(result);

        let explanation = match self.explainer.explain(state.question(), state.result()).await {
            Ok(text) => {
                state.push_trace(TraceEventType::Explanation, json!({ "degraded": false }));
                text
            }
            Err(e) => {
                warn!("Explanation failed, using fallback: {}", e);
                state.push_trace(
                    TraceEventType::Explanation,
                    json!({ "degraded": true, "error": e.to_string() }),
                );
                fallback_explanation(state.result())
            }
        };
        state.set_explanation(explanation);
        state.finish(Status::Success);
        state
    }

    fn fail(&self, mut state: PipelineState, error: AgentError) -> PipelineState {
        let attempt = state.attempt_count();
        let class = self.classifier.classify(&error);
        let will_retry = attempt < MAX_ATTEMPTS;
        warn!(
            "Attempt {}/{} failed ({}): {}",
            attempt, MAX_ATTEMPTS, class, error
        );

        state.record_failure(&error);
        state.push_trace(
            TraceEventType::Retry,
            json!({
                "attempt": attempt,
                "error": error.to_string(),
                "error_kind": error.kind(),
                "class": class.to_string(),
                "will_retry": will_retry,
            }),
        );

        if !will_retry {
            warn!("Attempt ceiling reached, giving up");
            let explanation = failure_explanation(state.last_error(), attempt);
            state.set_explanation(explanation);
            state.push_trace(
                TraceEventType::Error,
                json!({ "phase": Phase::Executor.as_str(), "error": error.to_string() }),
            );
            state.finish(Status::FailedTerminal);
        }
        state
    }
}
