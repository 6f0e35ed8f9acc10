//! Selector - plan to a bounded, ranked set of catalog fields

use crate::agent::bounded;
use crate::agent::contracts::{Phase, SelectedField, TraceEventType};
use crate::agent::state::PipelineState;
use crate::agent_prompts;
use crate::config::MAX_SELECTED_FIELDS;
use crate::error::{AgentError, Result};
use crate::llm::CompletionBackend;
use crate::schema::SchemaCatalog;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

lazy_static! {
    static ref JSON_ARRAY: Regex = Regex::new(r"(?s)\[.*?\]").expect("valid regex");
}

pub struct Selector {
    llm: Arc<dyn CompletionBackend>,
    catalog: Arc<SchemaCatalog>,
    timeout: Duration,
}

impl Selector {
    pub fn new(llm: Arc<dyn CompletionBackend>, catalog: Arc<SchemaCatalog>, timeout: Duration) -> Self {
        Self { llm, catalog, timeout }
    }

    /// Runs once per question; every failure here is fatal.
    pub async fn select(&self, mut state: PipelineState) -> (PipelineState, Result<()>) {
        state.enter(Phase::Selector);
        let outcome = self.run(&mut state).await;
        if let Err(ref e) = outcome {
            warn!("Selector failed: {}", e);
        }
        (state, outcome)
    }

    async fn run(&self, state: &mut PipelineState) -> Result<()> {
        let plan = state
            .plan()
            .ok_or_else(|| AgentError::StateInvariant("selector ran before planner".to_string()))?;

        let messages = agent_prompts::selector_messages(state.question(), plan, &self.catalog);
        let response = bounded("selector", self.timeout, self.llm.complete(&messages)).await?;

        let candidates = extract_field_names(&response, &self.catalog);
        debug!("Selector candidates: {:?}", candidates);
        let selected = rank_fields(&candidates, &self.catalog)?;

        info!(
            "Selected {} fields: {}",
            selected.len(),
            selected.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        state.push_trace(
            TraceEventType::Selection,
            json!({ "fields": selected.iter().map(|f| &f.name).collect::<Vec<_>>() }),
        );
        state.set_selected_fields(selected)
    }
}

/// Field names named by a completion: the first JSON array of strings, or
/// else catalog names appearing as whole words, in catalog order.
pub fn extract_field_names(text: &str, catalog: &SchemaCatalog) -> Vec<String> {
    for m in JSON_ARRAY.find_iter(text) {
        if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(m.as_str()) {
            let names: Vec<String> = values
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !names.is_empty() {
                return names;
            }
        }
    }

    let lowered = text.to_lowercase();
    catalog
        .fields()
        .iter()
        .filter(|f| contains_word(&lowered, &f.name.to_lowercase()))
        .map(|f| f.name.clone())
        .collect()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.map_or(false, is_word) && !after.map_or(false, is_word)
    })
}

/// Map names onto the catalog, drop unknowns and duplicates, cap and score.
pub fn rank_fields(candidates: &[String], catalog: &SchemaCatalog) -> Result<Vec<SelectedField>> {
    let mut seen = HashSet::new();
    let selected: Vec<SelectedField> = candidates
        .iter()
        .filter_map(|name| catalog.resolve(name))
        .filter(|field| seen.insert(field.name.clone()))
        .take(MAX_SELECTED_FIELDS)
        .enumerate()
        .map(|(rank, field)| SelectedField {
            name: field.name.clone(),
            description: field.description.clone(),
            relevance: (10 - rank as i32) as f64 / 10.0,
        })
        .collect();

    if selected.is_empty() {
        return Err(AgentError::SelectionEmpty(format!(
            "none of {} proposed names exist in the catalog",
            candidates.len()
        )));
    }
    Ok(selected)
}
