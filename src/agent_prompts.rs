//! Agent Prompts - prompt construction for each pipeline stage
//!
//! Every stage talks to the completion backend through a system message (the
//! stage's role and output contract) and a user message (the per-question data).

use crate::agent::contracts::{Plan, SelectedField};
use crate::agent::generator::GenerationContext;
use crate::execution::QueryResult;
use crate::llm::ChatMessage;
use crate::schema::SchemaCatalog;
use itertools::Itertools;

/// Descriptions are cut to this many characters in the Selector prompt.
const SELECTOR_DESCRIPTION_CHARS: usize = 150;
/// Above this many characters the schema listing is truncated...
const SELECTOR_SCHEMA_CHARS: usize = 8000;
/// ...to this many fields.
const SELECTOR_TRUNCATED_FIELDS: usize = 40;
/// Sample values shown after a field description.
const EXAMPLES_PER_FIELD: usize = 3;

pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are a Planner agent that breaks down questions about a tabular dataset into simple, executable steps.

Return a JSON plan with exactly this structure:
{
    "steps": [
        {
            "step_number": 1,
            "action": "filter|count|aggregate|join|select|sort",
            "description": "Clear description of what this step does",
            "filters": {"column": "column_name", "condition": "value or condition"},
            "target": "what we're looking for"
        }
    ],
    "final_action": "what the final result should be"
}

Rules:
- Break complex questions into simple steps
- Identify which columns might be needed
- Specify filter conditions clearly
- Some text columns hold semicolon-separated values

Return ONLY valid JSON, no additional text."#;

pub const SELECTOR_SYSTEM_PROMPT: &str = r#"You are a Schema Selector. Given a question and an execution plan, identify the most relevant dataset columns.

Return ONLY a JSON array of column names in order of relevance, like: ["Column1", "Column2", "Column3"]
Use only names from the Available Columns list. No explanations."#;

pub const GENERATOR_SYSTEM_PROMPT: &str = r#"You are a SQL Engineer agent. You write one read-only SQL query that answers the user's question.

CRITICAL: Return ONLY the SQL query, nothing else. No explanations, no markdown, just the SQL statement.
Start with SELECT."#;

pub const EXPLAINER_SYSTEM_PROMPT: &str = r#"You answer questions about a dataset using query results that have already been computed.

- If the question asks for a specific value (like a name or a count), give that value directly
- If the question asks for a list, summarize the key findings
- Do not explain the SQL or the process, just answer the question
- Use **bold** for important values
- Keep it brief and natural"#;

pub fn planner_messages(question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(PLANNER_SYSTEM_PROMPT),
        ChatMessage::user(format!("User Question: {}", question)),
    ]
}

pub fn selector_messages(question: &str, plan: &Plan, catalog: &SchemaCatalog) -> Vec<ChatMessage> {
    let user = format!(
        "User Question and Plan:\n{}\n\nPlan:\n{}\n\nAvailable Columns:\n{}\n\nIdentify the top 8-10 most relevant columns needed to answer this question.",
        question,
        plan.summary(),
        schema_listing(catalog)
    );
    vec![ChatMessage::system(SELECTOR_SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// `- name: description (e.g. ...)` per field, bounded for small context windows.
pub fn schema_listing(catalog: &SchemaCatalog) -> String {
    let lines: Vec<String> = catalog
        .fields()
        .iter()
        .map(|f| {
            let desc: String = f.description.chars().take(SELECTOR_DESCRIPTION_CHARS).collect();
            format!("- {}: {}{}", f.name, desc, example_suffix(&f.examples))
        })
        .collect();

    let full = lines.join("\n");
    if full.len() <= SELECTOR_SCHEMA_CHARS {
        return full;
    }
    format!(
        "{}\n... (and more columns)",
        lines.iter().take(SELECTOR_TRUNCATED_FIELDS).join("\n")
    )
}

fn example_suffix(examples: &[String]) -> String {
    if examples.is_empty() {
        return String::new();
    }
    format!(" (e.g. {})", examples.iter().take(EXAMPLES_PER_FIELD).join(", "))
}

pub fn generator_messages(
    context: &GenerationContext,
    question: &str,
    plan: &Plan,
    selected: &[SelectedField],
    catalog: &SchemaCatalog,
    recovery: Option<&str>,
) -> Vec<ChatMessage> {
    let column_context = selected
        .iter()
        .map(|f| {
            let examples = catalog
                .resolve(&f.name)
                .map(|info| example_suffix(&info.examples))
                .unwrap_or_default();
            format!("- {}: {}{}", f.name, f.description, examples)
        })
        .join("\n");
    let plan_json = serde_json::to_string_pretty(plan).unwrap_or_else(|_| plan.summary());

    let mut user = format!(
        "Relevant Columns (most likely needed):\n{}\n\nAll Available Columns: {}\n\nUser Question: {}\n\nPlan: {}\n",
        column_context,
        catalog.field_names().join(", "),
        question,
        plan_json
    );
    if let Some(recovery) = recovery {
        user.push_str(&format!("\n{}\n", recovery));
    }
    if !context.few_shot_examples.is_empty() {
        user.push_str("\nExamples:\n");
        for (i, ex) in context.few_shot_examples.iter().enumerate() {
            user.push_str(&format!(
                "Example {}:\nQuestion: \"{}\"\nSQL: {}\n",
                i + 1,
                ex.question,
                ex.sql
            ));
        }
    }
    user.push_str(&format!("\n{}\n\nGenerate the SQL query:", context.rules()));

    vec![ChatMessage::system(GENERATOR_SYSTEM_PROMPT), ChatMessage::user(user)]
}

pub fn explanation_messages(question: &str, result: &QueryResult) -> Vec<ChatMessage> {
    let n = result.row_count;
    let results_text = if n <= 5 {
        result.render_table(n)
    } else {
        format!("Found {} rows. First 3 rows:\n{}", n, result.render_table(3))
    };

    let user = format!(
        "User Question: {}\n\nQuery Results ({} row{}):\n{}\n\nAnswer:",
        question,
        n,
        if n == 1 { "" } else { "s" },
        results_text
    );
    vec![ChatMessage::system(EXPLAINER_SYSTEM_PROMPT), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::contracts::{ActionKind, PlanStep};
    use crate::config::AgentConfig;
    use crate::execution::Record;
    use crate::schema::FieldInfo;
    use serde_json::json;

    fn plan() -> Plan {
        Plan {
            steps: vec![PlanStep {
                step_number: 1,
                action: ActionKind::Filter,
                description: "Filter patients diagnosed with Glaucoma".to_string(),
                filter: None,
                target: Some("patients".to_string()),
            }],
            final_action: "Count them".to_string(),
        }
    }

    #[test]
    fn test_schema_listing_truncates_long_descriptions() {
        let long = "x".repeat(400);
        let catalog = SchemaCatalog::new(vec![FieldInfo::new("Notes", &long, &[])]).unwrap();
        let listing = schema_listing(&catalog);
        assert_eq!(listing.len(), "- Notes: ".len() + 150);
    }

    #[test]
    fn test_schema_listing_shows_sample_values() {
        let catalog = SchemaCatalog::new(vec![
            FieldInfo::new(
                "DiagnosisName",
                "Diagnoses for the visit",
                &["Glaucoma", "Cataract", "Myopia", "Keratoconus"],
            ),
            FieldInfo::new("Drugname", "Drug prescribed", &[]),
        ])
        .unwrap();
        let listing = schema_listing(&catalog);
        assert_eq!(
            listing,
            "- DiagnosisName: Diagnoses for the visit (e.g. Glaucoma, Cataract, Myopia)\n- Drugname: Drug prescribed"
        );
    }

    #[test]
    fn test_schema_listing_truncates_wide_catalogs() {
        let fields: Vec<FieldInfo> = (0..80)
            .map(|i| FieldInfo::new(&format!("Field{}", i), &"d".repeat(140), &[]))
            .collect();
        let catalog = SchemaCatalog::new(fields).unwrap();
        let listing = schema_listing(&catalog);
        assert!(listing.ends_with("... (and more columns)"));
        assert!(listing.contains("- Field39:"));
        assert!(!listing.contains("- Field40:"));
    }

    #[test]
    fn test_generator_prompt_contains_rules_and_recovery() {
        let context = GenerationContext::from_config(&AgentConfig::default());
        let selected = vec![SelectedField {
            name: "DiagnosisName".to_string(),
            description: "Diagnoses".to_string(),
            relevance: 1.0,
        }];
        let catalog = SchemaCatalog::new(vec![
            FieldInfo::new("Anonymous_Uid", "Patient identifier", &["E5F99"]),
            FieldInfo::new("DiagnosisName", "Diagnoses", &["Glaucoma", "Hypertension"]),
        ])
        .unwrap();
        let messages = generator_messages(
            &context,
            "count glaucoma patients",
            &plan(),
            &selected,
            &catalog,
            Some("PREVIOUS ATTEMPT FAILED"),
        );
        let user = &messages[1].content;
        assert!(user.contains("Table name: 'patient_data'"));
        assert!(user.contains("'Anonymous_Uid'"));
        assert!(user.contains("LIKE '%value%'"));
        assert!(user.contains("PREVIOUS ATTEMPT FAILED"));
        assert!(user.contains("- DiagnosisName: Diagnoses (e.g. Glaucoma, Hypertension)"));
        assert!(user.contains("All Available Columns: Anonymous_Uid, DiagnosisName"));
    }

    #[test]
    fn test_explanation_prompt_summarizes_large_results() {
        let rows: Vec<Record> = (0..8)
            .map(|i| {
                let mut r = Record::new();
                r.insert("n".to_string(), json!(i));
                r
            })
            .collect();
        let result = QueryResult::new(vec!["n".to_string()], rows, 0);
        let messages = explanation_messages("list them", &result);
        assert!(messages[1].content.contains("Found 8 rows. First 3 rows:"));
        assert!(messages[1].content.contains("(8 rows)"));
    }
}
