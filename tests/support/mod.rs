#![allow(dead_code)]

use async_trait::async_trait;
use aurorag::agent::AgentService;
use aurorag::agent_prompts;
use aurorag::config::AgentConfig;
use aurorag::error::{AgentError, Result};
use aurorag::execution::{DatasetEngine, DatasetStats, PolarsEngine, QueryResult};
use aurorag::llm::{ChatMessage, CompletionBackend};
use aurorag::schema::{FieldInfo, SchemaCatalog};
use polars::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Reply {
    Text(String),
    Fail(String),
    /// Never answers within any test timeout.
    Hang,
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

/// Completion backend that replays a fixed script and records every prompt.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// User message of the `n`th call.
    pub fn user_prompt(&self, n: usize) -> String {
        self.prompts.lock().unwrap()[n]
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(s)) => Ok(s),
            Some(Reply::Fail(msg)) => Err(AgentError::Llm(msg)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AgentError::Llm("woke up".to_string()))
            }
            None => Err(AgentError::Llm("script exhausted".to_string())),
        }
    }
}

/// Answers by stage, so any number of questions can share it.
pub struct RoutingBackend;

#[async_trait]
impl CompletionBackend for RoutingBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let system = messages[0].content.as_str();
        let user = messages[1].content.as_str();
        tokio::task::yield_now().await;

        if system == agent_prompts::PLANNER_SYSTEM_PROMPT {
            Ok(GLAUCOMA_PLAN.to_string())
        } else if system == agent_prompts::SELECTOR_SYSTEM_PROMPT {
            Ok(r#"["DiagnosisName", "Drugname", "Anonymous_Uid"]"#.to_string())
        } else if system == agent_prompts::GENERATOR_SYSTEM_PROMPT {
            if user.contains("User Question: which drug does E5F99 take") {
                Ok(DRUG_QUERY.to_string())
            } else {
                Ok(GLAUCOMA_COUNT_QUERY.to_string())
            }
        } else {
            Ok("Here is your answer.".to_string())
        }
    }
}

pub const GLAUCOMA_PLAN: &str = r#"{
  "steps": [
    {"step_number": 1, "action": "filter", "description": "Find patients diagnosed with Glaucoma",
     "filters": {"column": "DiagnosisName", "condition": "contains Glaucoma"}, "target": "patients"},
    {"step_number": 2, "action": "count", "description": "Count the matching patients"}
  ],
  "final_action": "Return the number of patients"
}"#;

pub const GLAUCOMA_COUNT_QUERY: &str =
    "SELECT COUNT(*) AS patient_count FROM patient_data WHERE DiagnosisName LIKE '%Glaucoma%'";

pub const DRUG_QUERY: &str =
    "SELECT Drugname FROM patient_data WHERE Anonymous_Uid = 'E5F99'";

pub fn patient_frame() -> DataFrame {
    df![
        "Anonymous_Uid" => ["E5F99", "E5F86", "E6A01", "E6B12"],
        "DiagnosisName" => [
            Some("Glaucoma;Hypertension"),
            Some("Diabetic Retinopathy"),
            Some("Glaucoma"),
            None
        ],
        "Drugname" => [Some("Timolol"), Some("Ranibizumab"), Some("Latanoprost"), None],
        "deptname" => ["GLAUCOMA CLINIC", "RETINA CLINIC", "GLAUCOMA CLINIC", "CORNEA CLINIC"],
        "Revalue" => [Some("6/9"), None, Some("6/6"), Some("6/18")]
    ]
    .unwrap()
}

pub fn patient_catalog() -> SchemaCatalog {
    SchemaCatalog::new(vec![
        FieldInfo::new("Anonymous_Uid", "Unique anonymised patient identifier", &["E5F99"]),
        FieldInfo::new(
            "DiagnosisName",
            "Diagnoses recorded for the visit, semicolon separated",
            &["Glaucoma", "Diabetic Retinopathy"],
        ),
        FieldInfo::new("Drugname", "Drug prescribed at the visit", &["Timolol"]),
        FieldInfo::new("deptname", "Clinic department that saw the patient", &["RETINA CLINIC"]),
        FieldInfo::new("Revalue", "Right eye visual acuity", &["6/9"]),
    ])
    .unwrap()
}

/// Dataset engine whose queries never finish; counts how often it was asked.
pub struct HangingEngine {
    executions: AtomicUsize,
}

impl HangingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            executions: AtomicUsize::new(0),
        })
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetEngine for HangingEngine {
    fn name(&self) -> &'static str {
        "hanging"
    }

    fn table_name(&self) -> &str {
        "patient_data"
    }

    async fn execute(&self, _sql: &str) -> Result<QueryResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(QueryResult::default())
    }

    fn stats(&self) -> DatasetStats {
        DatasetStats {
            tables: 1,
            rows: 0,
            columns: 0,
        }
    }
}

pub fn service_with_engine(
    config: AgentConfig,
    engine: Arc<dyn DatasetEngine>,
    llm: Arc<dyn CompletionBackend>,
) -> AgentService {
    AgentService::new(&config, Arc::new(patient_catalog()), engine, llm).unwrap()
}

pub fn service_with(config: AgentConfig, llm: Arc<dyn CompletionBackend>) -> AgentService {
    let engine = PolarsEngine::new(config.table_name.clone(), patient_frame());
    service_with_engine(config, Arc::new(engine), llm)
}

pub fn service(llm: Arc<dyn CompletionBackend>) -> AgentService {
    service_with(AgentConfig::default(), llm)
}
