//! Agent Configuration
//!
//! Settings come from the environment (a `.env` file is honoured by the binary)
//! and can be overridden field by field from the command line.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on Generator invocations per question.
pub const MAX_ATTEMPTS: u32 = 3;

/// Upper bound on the number of fields the Selector may hand to the Generator.
pub const MAX_SELECTED_FIELDS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub sql: String,
}

impl FewShotExample {
    pub fn new(question: &str, sql: &str) -> Self {
        Self {
            question: question.to_string(),
            sql: sql.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// API key for the completion endpoint. Local endpoints ignore it.
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,

    /// Relation name the dataset is registered under.
    pub table_name: String,
    /// Field that identifies a record (patient, customer, ...).
    pub id_field: String,
    /// Text fields holding semicolon-joined values.
    #[serde(default)]
    pub multi_value_fields: Vec<String>,
    #[serde(default)]
    pub few_shot_examples: Vec<FewShotExample>,

    pub llm_timeout_secs: u64,
    pub execution_timeout_secs: u64,
    pub question_budget_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "llama3.1:8b".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            temperature: 0.1,
            table_name: "patient_data".to_string(),
            id_field: "Anonymous_Uid".to_string(),
            multi_value_fields: vec!["DiagnosisName".to_string()],
            few_shot_examples: default_few_shot_examples(),
            llm_timeout_secs: 120,
            execution_timeout_secs: 30,
            question_budget_secs: 300,
        }
    }
}

impl AgentConfig {
    /// Build a config from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(table) = std::env::var("AURORAG_TABLE") {
            config.table_name = table;
        }
        if let Ok(id_field) = std::env::var("AURORAG_ID_FIELD") {
            config.id_field = id_field;
        }
        if let Ok(fields) = std::env::var("AURORAG_MULTI_VALUE_FIELDS") {
            config.multi_value_fields = fields
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect();
        }
        config.temperature = env_parse("AURORAG_TEMPERATURE", config.temperature)?;
        config.llm_timeout_secs = env_parse("AURORAG_LLM_TIMEOUT_SECS", config.llm_timeout_secs)?;
        config.execution_timeout_secs =
            env_parse("AURORAG_EXEC_TIMEOUT_SECS", config.execution_timeout_secs)?;
        config.question_budget_secs =
            env_parse("AURORAG_QUESTION_BUDGET_SECS", config.question_budget_secs)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(AgentError::Config("table name must not be empty".to_string()));
        }
        if self.id_field.trim().is_empty() {
            return Err(AgentError::Config("id field must not be empty".to_string()));
        }
        if self.llm_timeout_secs == 0 || self.execution_timeout_secs == 0 || self.question_budget_secs == 0 {
            return Err(AgentError::Config("timeouts must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::Config(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        Ok(())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn question_budget(&self) -> Duration {
        Duration::from_secs(self.question_budget_secs)
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AgentError::Config(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}

fn default_few_shot_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new(
            "Count patients with Diabetic Retinopathy",
            "SELECT COUNT(*) AS patient_count FROM patient_data WHERE DiagnosisName LIKE '%Diabetic Retinopathy%'",
        ),
        FewShotExample::new(
            "Show patients with vision problems in right eye",
            "SELECT Anonymous_Uid, Revalue, DiagnosisName FROM patient_data WHERE Revalue IS NOT NULL LIMIT 20",
        ),
        FewShotExample::new(
            "Count patients with both Glaucoma and Hypertension",
            "SELECT COUNT(*) AS patient_count FROM patient_data WHERE DiagnosisName LIKE '%Glaucoma%' AND DiagnosisName LIKE '%Hypertension%'",
        ),
        FewShotExample::new(
            "Show patients from Retina Clinic",
            "SELECT * FROM patient_data WHERE deptname LIKE '%RETINA CLINIC%' LIMIT 20",
        ),
        FewShotExample::new(
            "what drug is the patient E5F99 taking?",
            "SELECT Drugname FROM patient_data WHERE Anonymous_Uid = 'E5F99' AND Drugname IS NOT NULL",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.table_name, "patient_data");
        assert_eq!(config.id_field, "Anonymous_Uid");
        assert!(!config.few_shot_examples.is_empty());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = AgentConfig {
            execution_timeout_secs: 0,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_empty_table_rejected() {
        let config = AgentConfig {
            table_name: "  ".to_string(),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
