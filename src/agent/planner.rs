//! Planner - question to step plan

use crate::agent::bounded;
use crate::agent::contracts::{ActionKind, FilterSpec, Phase, Plan, PlanStep, TraceEventType};
use crate::agent::state::PipelineState;
use crate::agent_prompts;
use crate::error::{AgentError, Result};
use crate::llm::CompletionBackend;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

lazy_static! {
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").expect("valid regex");
}

pub struct Planner {
    llm: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Every failure here is fatal to the run.
    pub async fn plan(&self, mut state: PipelineState) -> (PipelineState, Result<()>) {
        state.enter(Phase::Planner);
        let outcome = self.run(&mut state).await;
        if let Err(ref e) = outcome {
            warn!("Planner failed: {}", e);
        }
        (state, outcome)
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        state.reset_attempts()?;
        if state.question().is_empty() {
            return Err(AgentError::EmptyQuestion);
        }

        let messages = agent_prompts::planner_messages(state.question());
        let response = bounded("planner", self.timeout, self.llm.complete(&messages)).await?;
        let plan = parse_plan(&response)?;

        info!("Plan created with {} steps", plan.steps.len());
        state.push_trace(
            TraceEventType::Plan,
            json!({ "steps": plan.steps.len(), "final_action": plan.final_action }),
        );
        state.set_plan(plan)
    }
}

/// Parse the JSON object in a completion into a `Plan`.
///
/// Field types are accepted loosely: models write step numbers as strings,
/// put filters under `filters` or `filter`, and use free-text actions.
pub fn parse_plan(text: &str) -> Result<Plan> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let object = JSON_OBJECT
        .find(&cleaned)
        .ok_or_else(|| AgentError::PlanParse("no JSON object in planner output".to_string()))?;
    let value: Value = serde_json::from_str(object.as_str())
        .map_err(|e| AgentError::PlanParse(format!("invalid plan JSON: {}", e)))?;

    let raw_steps = value
        .get("steps")
        .and_then(|s| s.as_array())
        .ok_or_else(|| AgentError::PlanParse("plan has no steps array".to_string()))?;

    let steps: Vec<PlanStep> = raw_steps
        .iter()
        .enumerate()
        .map(|(idx, step)| parse_step(idx, step))
        .collect();

    if steps.is_empty() {
        return Err(AgentError::PlanParse("plan has zero steps".to_string()));
    }

    let final_action = value
        .get("final_action")
        .map(scalar_text)
        .unwrap_or_default();

    Ok(Plan { steps, final_action })
}

fn parse_step(idx: usize, step: &Value) -> PlanStep {
    let step_number = match step.get("step_number") {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as u32),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(idx as u32 + 1);

    let action = step
        .get("action")
        .and_then(|a| a.as_str())
        .map(ActionKind::parse)
        .unwrap_or_default();

    let description = step.get("description").map(scalar_text).unwrap_or_default();

    let filter = step
        .get("filters")
        .or_else(|| step.get("filter"))
        .and_then(|f| f.as_object())
        .and_then(|f| {
            let parsed = FilterSpec {
                column: f.get("column").map(scalar_text).filter(|s| !s.is_empty()),
                condition: f.get("condition").map(scalar_text).filter(|s| !s.is_empty()),
            };
            if parsed.column.is_none() && parsed.condition.is_none() {
                None
            } else {
                Some(parsed)
            }
        });

    let target = step.get("target").map(scalar_text).filter(|s| !s.is_empty());

    PlanStep {
        step_number,
        action,
        description,
        filter,
        target,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_inside_fence() {
        let text = r#"Here is the plan:
```json
{
  "steps": [
    {"step_number": 1, "action": "filter", "description": "Find glaucoma patients",
     "filters": {"column": "DiagnosisName", "condition": "LIKE '%Glaucoma%'"}, "target": "patients"},
    {"step_number": "2", "action": "count", "description": "Count them"}
  ],
  "final_action": "Return the count"
}
```"#;
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].action, ActionKind::Filter);
        assert_eq!(
            plan.steps[0].filter.as_ref().unwrap().column.as_deref(),
            Some("DiagnosisName")
        );
        assert_eq!(plan.steps[1].step_number, 2);
        assert_eq!(plan.steps[1].action, ActionKind::Count);
        assert!(plan.steps[1].filter.is_none());
        assert_eq!(plan.final_action, "Return the count");
    }

    #[test]
    fn test_missing_step_number_uses_position() {
        let plan = parse_plan(r#"{"steps": [{"action": "select", "description": "a"}]}"#).unwrap();
        assert_eq!(plan.steps[0].step_number, 1);
        assert_eq!(plan.final_action, "");
    }

    #[test]
    fn test_zero_steps_is_parse_error() {
        let err = parse_plan(r#"{"steps": [], "final_action": "nothing"}"#).unwrap_err();
        assert!(matches!(err, AgentError::PlanParse(_)));
    }

    #[test]
    fn test_prose_is_parse_error() {
        assert!(matches!(
            parse_plan("I think you should count the patients."),
            Err(AgentError::PlanParse(_))
        ));
        assert!(matches!(parse_plan("{not json}"), Err(AgentError::PlanParse(_))));
    }
}
