//! Pipeline State
//!
//! The single record threaded through the four stages. Each stage takes it by
//! value and hands it on; write-once and monotonic fields are guarded here.

use crate::agent::contracts::{
    Phase, PipelineSnapshot, Plan, SelectedField, Status, TraceEvent, TraceEventType,
};
use crate::config::MAX_ATTEMPTS;
use crate::error::{AgentError, Result};
use crate::execution::QueryResult;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug)]
pub struct PipelineState {
    run_id: Uuid,
    question: String,
    plan: Option<Plan>,
    selected_fields: Option<Vec<SelectedField>>,
    candidate_query: String,
    attempt_count: u32,
    last_error: String,
    last_error_kind: Option<&'static str>,
    result: QueryResult,
    explanation: String,
    phase: Phase,
    status: Status,
    trace: Vec<TraceEvent>,
    started_at: DateTime<Utc>,
}

impl PipelineState {
    pub fn new(question: &str) -> Self {
        Self::with_run_id(question, Uuid::new_v4())
    }

    pub fn with_run_id(question: &str, run_id: Uuid) -> Self {
        Self {
            run_id,
            question: question.trim().to_string(),
            plan: None,
            selected_fields: None,
            candidate_query: String::new(),
            attempt_count: 0,
            last_error: String::new(),
            last_error_kind: None,
            result: QueryResult::default(),
            explanation: String::new(),
            phase: Phase::Planner,
            status: Status::Running,
            trace: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn set_plan(&mut self, plan: Plan) -> Result<()> {
        if self.plan.is_some() {
            return Err(AgentError::StateInvariant("plan already assigned".to_string()));
        }
        self.plan = Some(plan);
        Ok(())
    }

    pub fn selected_fields(&self) -> &[SelectedField] {
        self.selected_fields.as_deref().unwrap_or(&[])
    }

    pub fn set_selected_fields(&mut self, fields: Vec<SelectedField>) -> Result<()> {
        if self.selected_fields.is_some() {
            return Err(AgentError::StateInvariant("selected fields already assigned".to_string()));
        }
        self.selected_fields = Some(fields);
        Ok(())
    }

    pub fn candidate_query(&self) -> &str {
        &self.candidate_query
    }

    pub fn set_candidate_query(&mut self, query: String) {
        self.candidate_query = query;
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Planning starts a fresh attempt budget. Only valid before generation began.
    pub fn reset_attempts(&mut self) -> Result<()> {
        if self.phase != Phase::Planner {
            return Err(AgentError::StateInvariant(format!(
                "attempt counter reset requested in {}",
                self.phase
            )));
        }
        self.attempt_count = 0;
        Ok(())
    }

    /// Count one Generator invocation. Fails once the ceiling is reached.
    pub fn begin_attempt(&mut self) -> Result<u32> {
        if self.attempt_count >= MAX_ATTEMPTS {
            return Err(AgentError::StateInvariant(format!(
                "attempt ceiling of {} already reached",
                MAX_ATTEMPTS
            )));
        }
        self.attempt_count += 1;
        Ok(self.attempt_count)
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn result(&self) -> &QueryResult {
        &self.result
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn set_explanation(&mut self, explanation: String) {
        self.explanation = explanation;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    pub fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn push_trace(&mut self, event_type: TraceEventType, payload: Value) {
        self.trace.push(TraceEvent::now(event_type, payload));
    }

    /// Successful execution: keep the rows, forget the previous failure.
    pub fn record_success(&mut self, result: QueryResult) {
        self.result = result;
        self.last_error.clear();
        self.last_error_kind = None;
    }

    /// Failed stage: the error text becomes context for the next attempt.
    pub fn record_failure(&mut self, error: &AgentError) {
        self.result = QueryResult::default();
        self.last_error = error.to_string();
        self.last_error_kind = Some(error.kind());
    }

    pub fn finish(&mut self, status: Status) {
        self.status = status;
    }

    pub fn into_snapshot(self) -> PipelineSnapshot {
        let error_kind = if self.last_error.is_empty() {
            None
        } else {
            self.last_error_kind.map(|k| k.to_string())
        };

        PipelineSnapshot {
            run_id: self.run_id.to_string(),
            question: self.question,
            plan: self.plan,
            selected_fields: self.selected_fields.unwrap_or_default(),
            final_query: self.candidate_query,
            columns: self.result.columns,
            result_rows: self.result.rows,
            explanation: self.explanation,
            error: self.last_error,
            error_kind,
            status: self.status,
            terminal_phase: self.phase.as_str().to_string(),
            attempt_count: self.attempt_count,
            trace: self.trace,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
