//! Error Recovery
//!
//! Builds the retry context the Generator sees after a failed attempt.

use crate::execution_loop::error_classifier::{ErrorClassifier, FailureClass};
use crate::schema::SchemaCatalog;
use std::sync::Arc;

/// Error recovery prompt builder
pub struct ErrorRecovery {
    catalog: Arc<SchemaCatalog>,
    table_name: String,
    classifier: ErrorClassifier,
}

impl ErrorRecovery {
    pub fn new(catalog: Arc<SchemaCatalog>, table_name: impl Into<String>) -> Self {
        Self {
            catalog,
            table_name: table_name.into(),
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn classify(&self, last_error: &str) -> FailureClass {
        self.classifier.classify_message(last_error)
    }

    /// Build the recovery section from the recorded error and the query that produced it.
    pub fn build_recovery_prompt(&self, last_error: &str, failed_query: &str, attempt: u32) -> String {
        let mut prompt_parts = Vec::new();

        prompt_parts.push(format!(
            "PREVIOUS ATTEMPT FAILED (this is attempt {}):",
            attempt
        ));
        prompt_parts.push(format!("Error: {}", last_error));
        if !failed_query.is_empty() {
            prompt_parts.push(format!("Failed SQL: {}", failed_query));
        }

        match self.classify(last_error) {
            FailureClass::ColumnNotFound(missing) => {
                prompt_parts.push("A column referenced in the query does not exist.".to_string());
                if let Some(name) = missing {
                    let suggestions = self.catalog.closest(&name, 3);
                    if !suggestions.is_empty() {
                        prompt_parts.push(format!(
                            "Instead of '{}', did you mean: {}?",
                            name,
                            suggestions.join(", ")
                        ));
                    }
                }
                prompt_parts.push("Use only exact column names from the Available Columns list.".to_string());
            }
            FailureClass::TableNotFound => {
                prompt_parts.push(format!(
                    "The only table is '{}'. Do not query any other table.",
                    self.table_name
                ));
            }
            FailureClass::SyntaxError => {
                prompt_parts.push("The SQL did not parse. Write a single, simple SELECT statement.".to_string());
            }
            FailureClass::Extraction => {
                prompt_parts.push(
                    "No SQL statement could be found in your answer. Reply with the SQL query only, starting with SELECT."
                        .to_string(),
                );
            }
            FailureClass::Timeout => {
                prompt_parts.push("The previous attempt took too long. Prefer a simpler query with a LIMIT.".to_string());
            }
            FailureClass::Completion | FailureClass::Other => {}
        }

        prompt_parts.push("Please fix the SQL query based on this error.".to_string());
        prompt_parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldInfo;

    fn recovery() -> ErrorRecovery {
        let catalog = SchemaCatalog::new(vec![
            FieldInfo::new("Anonymous_Uid", "Patient identifier", &[]),
            FieldInfo::new("DiagnosisName", "Diagnoses", &[]),
            FieldInfo::new("Drugname", "Drug", &[]),
        ])
        .unwrap();
        ErrorRecovery::new(Arc::new(catalog), "patient_data")
    }

    #[test]
    fn test_missing_column_suggests_catalog_names() {
        let prompt = recovery().build_recovery_prompt(
            r#"Execution error: not found: unable to find column "Diagnosis"; valid columns: []"#,
            "SELECT Diagnosis FROM patient_data",
            2,
        );
        assert!(prompt.contains("attempt 2"));
        assert!(prompt.contains("Failed SQL: SELECT Diagnosis FROM patient_data"));
        assert!(prompt.contains("did you mean: DiagnosisName"));
    }

    #[test]
    fn test_extraction_failure_asks_for_bare_sql() {
        let prompt = recovery().build_recovery_prompt(
            "Query extraction error: no SELECT statement found",
            "",
            3,
        );
        assert!(!prompt.contains("Failed SQL"));
        assert!(prompt.contains("starting with SELECT"));
    }

    #[test]
    fn test_missing_table_names_the_table() {
        let prompt = recovery().build_recovery_prompt(
            "Execution error: relation 'patients' was not found",
            "SELECT * FROM patients",
            2,
        );
        assert!(prompt.contains("The only table is 'patient_data'"));
    }
}
