pub mod agent;
pub mod agent_prompts;
pub mod config;
pub mod error;
pub mod execution;
pub mod execution_loop;
pub mod ingest;
pub mod llm;
pub mod schema;

pub use agent::{AgentService, Pipeline, PipelineSnapshot, PipelineState, Status};
pub use config::{AgentConfig, FewShotExample, MAX_ATTEMPTS, MAX_SELECTED_FIELDS};
pub use error::{AgentError, Result};
pub use execution::{DatasetEngine, DatasetStats, PolarsEngine, QueryResult, Record};
pub use llm::{ChatMessage, CompletionBackend, LlmClient};
pub use schema::{FieldInfo, SchemaCatalog};
