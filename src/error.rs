use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error("Selection empty: {0}")]
    SelectionEmpty(String),

    #[error("Query extraction error: {0}")]
    QueryExtraction(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Timeout in {stage} after {seconds}s")]
    Timeout { stage: String, seconds: u64 },

    #[error("Explanation error: {0}")]
    Explanation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema catalog error: {0}")]
    Catalog(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Pipeline state invariant violated: {0}")]
    StateInvariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl AgentError {
    pub fn timeout(stage: &str, after: std::time::Duration) -> Self {
        AgentError::Timeout {
            stage: stage.to_string(),
            seconds: after.as_secs(),
        }
    }

    /// Taxonomy name reported in the terminal snapshot.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::EmptyQuestion => "EmptyQuestionError",
            AgentError::PlanParse(_) => "PlanParseError",
            AgentError::SelectionEmpty(_) => "SelectionEmptyError",
            AgentError::QueryExtraction(_) => "QueryExtractionError",
            AgentError::Execution(_) | AgentError::Polars(_) => "ExecutionError",
            AgentError::Timeout { .. } => "TimeoutError",
            AgentError::Explanation(_) => "ExplanationError",
            AgentError::Llm(_) => "LlmError",
            AgentError::Config(_) => "ConfigError",
            AgentError::Catalog(_) | AgentError::Csv(_) => "CatalogError",
            AgentError::Dataset(_) => "DatasetError",
            AgentError::StateInvariant(_) => "StateInvariantError",
            AgentError::Io(_) => "IoError",
            AgentError::Json(_) => "JsonError",
        }
    }
}

impl From<polars::error::PolarsError> for AgentError {
    fn from(err: polars::error::PolarsError) -> Self {
        AgentError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
