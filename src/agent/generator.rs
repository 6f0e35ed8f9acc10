//! Generator - plan and selected fields to one candidate SQL query
//!
//! Each invocation counts one attempt, successful or not. On a retry the
//! prompt carries the previous error and the query that produced it.

use crate::agent::bounded;
use crate::agent::contracts::{Phase, TraceEventType};
use crate::agent::state::PipelineState;
use crate::agent_prompts;
use crate::config::{AgentConfig, FewShotExample, MAX_ATTEMPTS};
use crate::error::{AgentError, Result};
use crate::execution_loop::ErrorRecovery;
use crate::llm::CompletionBackend;
use crate::schema::SchemaCatalog;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shortest text accepted as a query.
const MIN_QUERY_CHARS: usize = 10;

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n(.*?)```").expect("valid regex");
    static ref LEADING_SELECT: Regex = Regex::new(r"(?im)^[ \t]*(select)\b").expect("valid regex");
    static ref SELECT_KEYWORD: Regex = Regex::new(r"(?i)\bselect\b").expect("valid regex");
    static ref BLANK_LINE: Regex = Regex::new(r"\n[ \t]*\r?\n").expect("valid regex");
    static ref LABEL_LINE: Regex = Regex::new(r"(?m)^[ \t]*[A-Z][a-z]+:").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// What the Generator knows about the dataset beyond the selected fields.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub table_name: String,
    pub id_field: String,
    pub multi_value_fields: Vec<String>,
    pub few_shot_examples: Vec<FewShotExample>,
}

impl GenerationContext {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            table_name: config.table_name.clone(),
            id_field: config.id_field.clone(),
            multi_value_fields: config.multi_value_fields.clone(),
            few_shot_examples: config.few_shot_examples.clone(),
        }
    }

    /// Dataset-specific rules appended to every generation prompt.
    pub fn rules(&self) -> String {
        let mut rules = vec![
            "Important Rules:".to_string(),
            format!("- Table name: '{}' (this is the only table)", self.table_name),
            format!(
                "- The record identifier is '{}'. There is no 'id' column",
                self.id_field
            ),
        ];
        for field in &self.multi_value_fields {
            rules.push(format!(
                "- {} holds multiple values separated by semicolons: use LIKE '%value%', never =",
                field
            ));
        }
        if !self.multi_value_fields.is_empty() {
            rules.push("- For several values in the same field, combine LIKE conditions with AND".to_string());
        }
        rules.push("- Missing values are NULL: use IS NULL / IS NOT NULL, never = NULL".to_string());
        rules.push("- Use column names exactly as listed".to_string());
        rules.push("- Add LIMIT 20 when listing records".to_string());
        rules.join("\n")
    }
}

pub struct Generator {
    llm: Arc<dyn CompletionBackend>,
    catalog: Arc<SchemaCatalog>,
    context: GenerationContext,
    recovery: ErrorRecovery,
    timeout: Duration,
}

impl Generator {
    pub fn new(
        llm: Arc<dyn CompletionBackend>,
        catalog: Arc<SchemaCatalog>,
        context: GenerationContext,
        timeout: Duration,
    ) -> Self {
        let recovery = ErrorRecovery::new(catalog.clone(), context.table_name.clone());
        Self {
            llm,
            catalog,
            context,
            recovery,
            timeout,
        }
    }

    pub async fn generate(&self, mut state: PipelineState) -> (PipelineState, Result<String>) {
        state.enter(Phase::Generator);
        let attempt = match state.begin_attempt() {
            Ok(attempt) => attempt,
            Err(e) => return (state, Err(e)),
        };
        info!("Generating SQL (attempt {}/{})", attempt, MAX_ATTEMPTS);

        let outcome = self.run(&state, attempt).await;
        match &outcome {
            Ok(sql) => {
                debug!("Candidate SQL: {}", sql);
                state.set_candidate_query(sql.clone());
                state.push_trace(
                    TraceEventType::Generation,
                    json!({ "attempt": attempt, "sql": sql }),
                );
            }
            Err(e) => {
                warn!("Generation attempt {} failed: {}", attempt, e);
                state.set_candidate_query(String::new());
                state.push_trace(
                    TraceEventType::Generation,
                    json!({ "attempt": attempt, "error": e.to_string() }),
                );
            }
        }
        (state, outcome)
    }

    async fn run(&self, state: &PipelineState, attempt: u32) -> Result<String> {
        let plan = state
            .plan()
            .ok_or_else(|| AgentError::StateInvariant("generator ran before planner".to_string()))?;

        let recovery = if attempt > 1 && !state.last_error().is_empty() {
            Some(self.recovery.build_recovery_prompt(
                state.last_error(),
                state.candidate_query(),
                attempt,
            ))
        } else {
            None
        };

        let messages = agent_prompts::generator_messages(
            &self.context,
            state.question(),
            plan,
            state.selected_fields(),
            &self.catalog,
            recovery.as_deref(),
        );
        let response = bounded("generator", self.timeout, self.llm.complete(&messages)).await?;
        extract_query(&response)
    }
}

/// Pull a single SELECT statement out of a completion.
///
/// A fenced block is used only when it holds a valid query. Otherwise the
/// statement starts at the first line beginning with SELECT, or failing that
/// at the first SELECT anywhere.
pub fn extract_query(raw: &str) -> Result<String> {
    for block in FENCED_BLOCK.captures_iter(raw).filter_map(|c| c.get(1)) {
        let query = normalize_query(block.as_str());
        if validate_query(&query).is_ok() {
            return Ok(query);
        }
    }

    let start = LEADING_SELECT
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.start())
        .or_else(|| SELECT_KEYWORD.find(raw).map(|m| m.start()))
        .ok_or_else(|| AgentError::QueryExtraction("no SELECT statement found".to_string()))?;

    let query = normalize_query(cut_statement(&raw[start..]));
    validate_query(&query)?;
    Ok(query)
}

fn normalize_query(candidate: &str) -> String {
    let candidate = candidate.replace('`', "");
    let normalized = WHITESPACE.replace_all(candidate.trim(), " ");
    normalized.trim_end_matches(';').trim_end().to_string()
}

fn validate_query(query: &str) -> Result<()> {
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(AgentError::QueryExtraction(format!(
            "candidate too short: {:?}",
            query
        )));
    }
    let starts_with_select = query
        .get(..6)
        .map_or(false, |head| head.eq_ignore_ascii_case("select"));
    if !starts_with_select {
        return Err(AgentError::QueryExtraction(format!(
            "candidate does not start with SELECT: {:?}",
            query
        )));
    }
    Ok(())
}

/// End the statement at a `;` outside quotes, a blank line, or a prose label line.
fn cut_statement(text: &str) -> &str {
    let mut end = text.len();

    if let Some(pos) = unquoted_semicolon(text) {
        end = end.min(pos);
    }
    if let Some(m) = BLANK_LINE.find(text) {
        end = end.min(m.start());
    }
    if let Some(newline) = text.find('\n') {
        if let Some(m) = LABEL_LINE.find(&text[newline + 1..]) {
            end = end.min(newline + 1 + m.start());
        }
    }

    &text[..end]
}

fn unquoted_semicolon(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, c) in text.char_indices() {
        match (quote, c) {
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ';') => return Some(idx),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_fenced_block() {
        let raw = "Sure, here it is:\n```sql\nSELECT COUNT(*)\nFROM patient_data\nWHERE DiagnosisName LIKE '%Glaucoma%';\n```\nThis counts patients.";
        assert_eq!(
            extract_query(raw).unwrap(),
            "SELECT COUNT(*) FROM patient_data WHERE DiagnosisName LIKE '%Glaucoma%'"
        );
    }

    #[test]
    fn test_extract_from_prose() {
        let raw = "Query:\nSELECT Drugname FROM patient_data WHERE Anonymous_Uid = 'E5F99'\nExplanation: filters by patient.";
        assert_eq!(
            extract_query(raw).unwrap(),
            "SELECT Drugname FROM patient_data WHERE Anonymous_Uid = 'E5F99'"
        );
    }

    #[test]
    fn test_semicolon_inside_quotes_is_kept() {
        let raw = "SELECT * FROM patient_data WHERE DiagnosisName = 'Glaucoma;Hypertension'; SELECT 1";
        assert_eq!(
            extract_query(raw).unwrap(),
            "SELECT * FROM patient_data WHERE DiagnosisName = 'Glaucoma;Hypertension'"
        );
    }

    #[test]
    fn test_blank_line_ends_statement() {
        let raw = "SELECT COUNT(*) FROM patient_data\n\nThe query above counts every row.";
        assert_eq!(extract_query(raw).unwrap(), "SELECT COUNT(*) FROM patient_data");
    }

    #[test]
    fn test_prose_verb_before_statement_is_skipped() {
        let raw = "I will select the rows you need.\nSELECT COUNT(*) FROM patient_data WHERE DiagnosisName LIKE '%Glaucoma%'";
        assert_eq!(
            extract_query(raw).unwrap(),
            "SELECT COUNT(*) FROM patient_data WHERE DiagnosisName LIKE '%Glaucoma%'"
        );
    }

    #[test]
    fn test_non_sql_fence_falls_through_to_statement() {
        let raw = "```json\n{\"note\": 1}\n```\nSELECT COUNT(*) FROM patient_data";
        assert_eq!(extract_query(raw).unwrap(), "SELECT COUNT(*) FROM patient_data");
    }

    #[test]
    fn test_inline_select_used_when_no_line_starts_with_it() {
        let raw = "The query is: select Drugname from patient_data where Anonymous_Uid = 'E5F99'";
        assert_eq!(
            extract_query(raw).unwrap(),
            "select Drugname from patient_data where Anonymous_Uid = 'E5F99'"
        );
    }

    #[test]
    fn test_rejects_non_select_and_short() {
        assert!(matches!(
            extract_query("I cannot help with that."),
            Err(AgentError::QueryExtraction(_))
        ));
        assert!(matches!(extract_query("SELECT 1"), Err(AgentError::QueryExtraction(_))));
        assert!(matches!(
            extract_query("```\nDELETE FROM patient_data\n```"),
            Err(AgentError::QueryExtraction(_))
        ));
    }

    #[test]
    fn test_rules_name_table_and_identifier() {
        let context = GenerationContext::from_config(&AgentConfig::default());
        let rules = context.rules();
        assert!(rules.contains("'patient_data'"));
        assert!(rules.contains("'Anonymous_Uid'"));
        assert!(rules.contains("DiagnosisName holds multiple values"));
    }
}
