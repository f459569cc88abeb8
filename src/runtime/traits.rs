//! Trait abstractions for the collaborators a conversation depends on
//!
//! These traits enable testing the controller with mock implementations.

use crate::checkpoint::{NewStep, Step};
use crate::db::Database;
use crate::file_refs::ProjectFile;
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::postprocess::Reply;
use crate::session::AgentRole;
use async_trait::async_trait;
use serde_json::Value;

/// Persistence for recorded steps
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Most recent step with this identity in the project
    async fn lookup_step(&self, project_id: &str, hash_id: &str) -> Result<Option<Step>, String>;

    /// Append a step. A following `lookup_step` with the same identity must
    /// return it.
    async fn save_step(&self, step: &NewStep) -> Result<Step, String>;

    /// Delete steps recorded after `step_id`, returning how many went away
    async fn truncate_after(&self, project_id: &str, step_id: i64) -> Result<usize, String>;

    /// Delete steps that are not `step_id` or one of its ancestors
    async fn delete_unrelated(&self, project_id: &str, step_id: i64) -> Result<usize, String>;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request. `LlmResponse::Empty` signals a failed call.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Prompt template rendering. Pure: same inputs, same text.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, prompt_path: &str, data: &Value) -> Result<String, String>;

    /// System message for an agent role
    fn system_message(&self, role: AgentRole) -> Result<String, String>;
}

/// Terminal interaction with the human driving the session
#[async_trait]
pub trait UserInterface: Send + Sync {
    /// Block until the human answers `last_response`
    async fn ask_human(
        &self,
        project_id: &str,
        last_response: &Reply,
        allow_empty: bool,
    ) -> Result<String, String>;

    /// Echo turn output to the human
    fn show(&self, step_id: Option<i64>, content: &str);
}

/// Project file state
#[async_trait]
pub trait ProjectFiles: Send + Sync {
    async fn list_current_files(&self) -> Result<Vec<ProjectFile>, String>;

    /// Write the files recorded for `step_id` back into the project
    async fn restore_files(&self, step_id: i64) -> Result<(), String>;

    /// Record the current files against `step_id`
    async fn snapshot_files(&self, step_id: i64) -> Result<(), String>;
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a `StepStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl StepStore for DatabaseStorage {
    async fn lookup_step(&self, project_id: &str, hash_id: &str) -> Result<Option<Step>, String> {
        self.db
            .find_step(project_id, hash_id)
            .map_err(|e| e.to_string())
    }

    async fn save_step(&self, step: &NewStep) -> Result<Step, String> {
        self.db.insert_step(step).map_err(|e| e.to_string())
    }

    async fn truncate_after(&self, project_id: &str, step_id: i64) -> Result<usize, String> {
        self.db
            .delete_steps_after(project_id, step_id)
            .map_err(|e| e.to_string())
    }

    async fn delete_unrelated(&self, project_id: &str, step_id: i64) -> Result<usize, String> {
        self.db
            .delete_steps_off_branch(project_id, step_id)
            .map_err(|e| e.to_string())
    }
}
