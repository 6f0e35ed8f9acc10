use crate::execution::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Filter,
    Count,
    Aggregate,
    Join,
    Select,
    Sort,
    #[default]
    Other,
}

impl ActionKind {
    /// Lenient mapping from the free-text action a model writes.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "filter" | "where" => ActionKind::Filter,
            "count" => ActionKind::Count,
            "aggregate" | "aggregation" | "sum" | "avg" | "average" | "group" | "group_by" => {
                ActionKind::Aggregate
            }
            "join" => ActionKind::Join,
            "select" | "query" | "lookup" | "list" | "show" => ActionKind::Select,
            "sort" | "order" | "order_by" | "rank" => ActionKind::Sort,
            _ => ActionKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_number: u32,
    pub action: ActionKind,
    pub description: String,
    #[serde(default)]
    pub filter: Option<FilterSpec>,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub final_action: String,
}

impl Plan {
    /// One line per step, used when the plan is quoted back into a prompt.
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .map(|s| format!("Step {}: {}", s.step_number, s.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A catalog field chosen as relevant, ranked by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedField {
    pub name: String,
    pub description: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planner,
    Selector,
    Generator,
    Executor,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planner => "planner",
            Phase::Selector => "selector",
            Phase::Generator => "generator",
            Phase::Executor => "executor",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Running,
    Success,
    FailedTerminal,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Running => write!(f, "RUNNING"),
            Status::Success => write!(f, "SUCCESS"),
            Status::FailedTerminal => write!(f, "FAILED_TERMINAL"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventType {
    Plan,
    Selection,
    Generation,
    Execution,
    Retry,
    Explanation,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub ts_ms: u64,
    pub event_type: TraceEventType,
    #[serde(default)]
    pub payload: Value,
}

impl TraceEvent {
    pub fn now(event_type: TraceEventType, payload: Value) -> Self {
        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            ts_ms,
            event_type,
            payload,
        }
    }
}

/// Final view of a pipeline run, success or failure, handed back as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub run_id: String,
    pub question: String,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub selected_fields: Vec<SelectedField>,
    pub final_query: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub result_rows: Vec<Record>,
    pub explanation: String,
    /// Empty on success.
    pub error: String,
    #[serde(default)]
    pub error_kind: Option<String>,
    pub status: Status,
    pub terminal_phase: String,
    pub attempt_count: u32,
    #[serde(default)]
    pub trace: Vec<TraceEvent>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineSnapshot {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
