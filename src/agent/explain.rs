//! Explanation - turn query results or failures into an answer for the user

use crate::agent::bounded;
use crate::agent_prompts;
use crate::error::{AgentError, Result};
use crate::execution::{display_value, QueryResult};
use crate::llm::CompletionBackend;
use std::sync::Arc;
use std::time::Duration;

pub const NO_RECORDS_MESSAGE: &str = "No matching records found for your query.";

pub struct Explainer {
    llm: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl Explainer {
    pub fn new(llm: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Answer the question from `result`. Empty results skip the completion call.
    pub async fn explain(&self, question: &str, result: &QueryResult) -> Result<String> {
        if result.is_empty() {
            return Ok(NO_RECORDS_MESSAGE.to_string());
        }

        let messages = agent_prompts::explanation_messages(question, result);
        let text = bounded("explanation", self.timeout, self.llm.complete(&messages))
            .await
            .map_err(|e| match e {
                AgentError::Timeout { .. } => e,
                other => AgentError::Explanation(other.to_string()),
            })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::Explanation("empty explanation".to_string()));
        }
        Ok(text.to_string())
    }
}

/// Templated answer used when the explanation call fails.
pub fn fallback_explanation(result: &QueryResult) -> String {
    if let Some(value) = result.scalar() {
        return format!("**{}**", display_value(value));
    }
    if result.is_empty() {
        return NO_RECORDS_MESSAGE.to_string();
    }
    format!(
        "Found {} record{}. See results below.",
        result.row_count,
        if result.row_count == 1 { "" } else { "s" }
    )
}

/// Answer for a run that used up its attempts.
pub fn failure_explanation(last_error: &str, attempts: u32) -> String {
    format!(
        "I wasn't able to answer this question after {} attempt{}. The last error was: {}",
        attempts,
        if attempts == 1 { "" } else { "s" },
        last_error
    )
}

/// Answer for a run stopped by a non-retryable error.
pub fn fatal_explanation(error: &AgentError) -> String {
    match error {
        AgentError::EmptyQuestion => "Please ask a question about the dataset.".to_string(),
        AgentError::PlanParse(_) => {
            "I couldn't break this question down into steps. Please try rephrasing it.".to_string()
        }
        AgentError::SelectionEmpty(_) => {
            "I couldn't find any fields in the dataset related to this question.".to_string()
        }
        AgentError::Timeout { stage, .. } => {
            format!("The {} step timed out. Please try again.", stage)
        }
        other => format!("Something went wrong while answering: {}", other),
    }
}
