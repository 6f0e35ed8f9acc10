//! Error Classifier
//!
//! Classifies generation and execution failures into a small taxonomy.
//! The class only shapes the retry prompt; every class is retried alike.

use crate::error::AgentError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref MISSING_COLUMN: Regex = Regex::new(
        r#"(?i)(?:unable to find column|no such column|column not found|unknown column)[:\s]*["'`]?([A-Za-z0-9_]+)"#
    )
    .expect("valid regex");
    static ref MISSING_COLUMN_TRAILING: Regex =
        Regex::new(r#"(?i)column\s+["'`]([A-Za-z0-9_]+)["'`]\s+(?:not found|does not exist)"#).expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// Query referenced a column the dataset does not have; carries the name when known.
    ColumnNotFound(Option<String>),
    TableNotFound,
    SyntaxError,
    Extraction,
    Timeout,
    Completion,
    Other,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::ColumnNotFound(Some(name)) => write!(f, "ColumnNotFound({})", name),
            FailureClass::ColumnNotFound(None) => write!(f, "ColumnNotFound"),
            FailureClass::TableNotFound => write!(f, "TableNotFound"),
            FailureClass::SyntaxError => write!(f, "SyntaxError"),
            FailureClass::Extraction => write!(f, "Extraction"),
            FailureClass::Timeout => write!(f, "Timeout"),
            FailureClass::Completion => write!(f, "Completion"),
            FailureClass::Other => write!(f, "Other"),
        }
    }
}

/// Error classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &AgentError) -> FailureClass {
        match error {
            AgentError::QueryExtraction(_) => return FailureClass::Extraction,
            AgentError::Timeout { .. } => return FailureClass::Timeout,
            AgentError::Llm(_) => return FailureClass::Completion,
            _ => {}
        }
        self.classify_message(&error.to_string())
    }

    /// Classify from the recorded error text alone.
    pub fn classify_message(&self, message: &str) -> FailureClass {
        let msg = message.to_lowercase();

        if msg.starts_with("query extraction error") {
            return FailureClass::Extraction;
        }

        if msg.starts_with("timeout in") {
            return FailureClass::Timeout;
        }

        if msg.contains("column")
            && (msg.contains("not found")
                || msg.contains("unable to find")
                || msg.contains("no such")
                || msg.contains("does not exist")
                || msg.contains("unknown"))
        {
            return FailureClass::ColumnNotFound(missing_column(message));
        }

        if (msg.contains("table") || msg.contains("relation"))
            && (msg.contains("not found") || msg.contains("no such") || msg.contains("does not exist"))
        {
            return FailureClass::TableNotFound;
        }

        if msg.contains("syntax") || msg.contains("parser error") || msg.contains("expected") {
            return FailureClass::SyntaxError;
        }

        FailureClass::Other
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_column(message: &str) -> Option<String> {
    MISSING_COLUMN
        .captures(message)
        .or_else(|| MISSING_COLUMN_TRAILING.captures(message))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
