//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::Collaborators;
use crate::checkpoint::{NewStep, Step};
use crate::file_refs::ProjectFile;
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::postprocess::Reply;
use crate::session::AgentRole;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// In-Memory Step Store
// ============================================================================

/// In-memory step storage for testing
pub struct InMemoryStepStore {
    steps: Mutex<Vec<Step>>,
    next_id: Mutex<i64>,
}

impl InMemoryStepStore {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.lock().unwrap().len()
    }

    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().clone()
    }
}

impl Default for InMemoryStepStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepStore for InMemoryStepStore {
    async fn lookup_step(&self, project_id: &str, hash_id: &str) -> Result<Option<Step>, String> {
        Ok(self
            .steps
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.project_id == project_id && s.hash_id == hash_id)
            .cloned())
    }

    async fn save_step(&self, step: &NewStep) -> Result<Step, String> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        let saved = Step {
            id,
            project_id: step.key.project_id.clone(),
            hash_id: step.key.hash_id(),
            prompt_path: step.key.prompt_path.clone(),
            prompt_data: step.key.prompt_data.clone(),
            llm_req_num: step.key.llm_req_num,
            messages: step.messages.clone(),
            llm_response: step.llm_response.clone(),
            previous_step: step.previous_step,
            high_level_step: step.high_level_step.clone(),
            created_at: Utc::now(),
        };
        self.steps.lock().unwrap().push(saved.clone());
        Ok(saved)
    }

    async fn truncate_after(&self, project_id: &str, step_id: i64) -> Result<usize, String> {
        let mut steps = self.steps.lock().unwrap();
        let before = steps.len();
        steps.retain(|s| s.project_id != project_id || s.id <= step_id);
        Ok(before - steps.len())
    }

    async fn delete_unrelated(&self, project_id: &str, step_id: i64) -> Result<usize, String> {
        let mut steps = self.steps.lock().unwrap();
        let parents: HashMap<i64, Option<i64>> = steps
            .iter()
            .filter(|s| s.project_id == project_id)
            .map(|s| (s.id, s.previous_step))
            .collect();
        let mut keep = HashSet::new();
        let mut cursor = Some(step_id);
        while let Some(id) = cursor {
            if !keep.insert(id) {
                break;
            }
            cursor = parents.get(&id).copied().flatten();
        }
        let before = steps.len();
        steps.retain(|s| s.project_id != project_id || keep.contains(&s.id));
        Ok(before - steps.len())
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// Renders `"<path>: <data>"` so tests can see exactly what was sent
pub struct EchoPrompts;

impl PromptRenderer for EchoPrompts {
    fn render(&self, prompt_path: &str, data: &Value) -> Result<String, String> {
        if prompt_path.starts_with("missing/") {
            return Err(format!("Template not found: {prompt_path}"));
        }
        Ok(format!("{prompt_path}: {data}"))
    }

    fn system_message(&self, role: AgentRole) -> Result<String, String> {
        Ok(format!("You are the {role}."))
    }
}

// ============================================================================
// Scripted User
// ============================================================================

/// User interface that answers from a script and records what it was shown
pub struct ScriptedUser {
    answers: Mutex<VecDeque<String>>,
    /// Replies the user was asked about, with the `allow_empty` flag
    pub asked: Mutex<Vec<(Reply, bool)>>,
    /// Content echoed to the user, with the step id shown alongside
    pub shown: Mutex<Vec<(Option<i64>, String)>>,
}

impl ScriptedUser {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            asked: Mutex::new(Vec::new()),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_answer(&self, answer: impl Into<String>) {
        self.answers.lock().unwrap().push_back(answer.into());
    }

    pub fn shown(&self) -> Vec<(Option<i64>, String)> {
        self.shown.lock().unwrap().clone()
    }

    pub fn asked(&self) -> Vec<(Reply, bool)> {
        self.asked.lock().unwrap().clone()
    }
}

impl Default for ScriptedUser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserInterface for ScriptedUser {
    async fn ask_human(
        &self,
        _project_id: &str,
        last_response: &Reply,
        allow_empty: bool,
    ) -> Result<String, String> {
        self.asked
            .lock()
            .unwrap()
            .push((last_response.clone(), allow_empty));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "No scripted answer left".to_string())
    }

    fn show(&self, step_id: Option<i64>, content: &str) {
        self.shown
            .lock()
            .unwrap()
            .push((step_id, content.to_string()));
    }
}

// ============================================================================
// In-Memory Project Files
// ============================================================================

/// Project files held in memory, with per-step snapshots
pub struct InMemoryFiles {
    current: Mutex<Vec<ProjectFile>>,
    snapshots: Mutex<HashMap<i64, Vec<ProjectFile>>>,
    failure: Mutex<Option<String>>,
    /// Step ids passed to `restore_files`, in call order
    pub restored: Mutex<Vec<i64>>,
}

impl InMemoryFiles {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Vec::new()),
            snapshots: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            restored: Mutex::new(Vec::new()),
        }
    }

    pub fn set_file(&self, path: &str, content: &str) {
        let mut current = self.current.lock().unwrap();
        match current.iter_mut().find(|f| f.path == path) {
            Some(file) => file.content = content.to_string(),
            None => current.push(ProjectFile::new(path, content)),
        }
    }

    /// Make every following call fail with `message`
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    fn check(&self) -> Result<(), String> {
        self.failure.lock().unwrap().clone().map_or(Ok(()), Err)
    }

    pub fn restored(&self) -> Vec<i64> {
        self.restored.lock().unwrap().clone()
    }

    pub fn snapshot_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.snapshots.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for InMemoryFiles {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectFiles for InMemoryFiles {
    async fn list_current_files(&self) -> Result<Vec<ProjectFile>, String> {
        self.check()?;
        Ok(self.current.lock().unwrap().clone())
    }

    async fn restore_files(&self, step_id: i64) -> Result<(), String> {
        self.check()?;
        self.restored.lock().unwrap().push(step_id);
        if let Some(files) = self.snapshots.lock().unwrap().get(&step_id) {
            self.current.lock().unwrap().clone_from(files);
        }
        Ok(())
    }

    async fn snapshot_files(&self, step_id: i64) -> Result<(), String> {
        self.check()?;
        let files = self.current.lock().unwrap().clone();
        self.snapshots.lock().unwrap().insert(step_id, files);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// All mocks wired into a `Collaborators`, with handles kept for assertions
pub struct TestHarness {
    pub deps: Collaborators,
    pub llm: Arc<MockLlmClient>,
    pub steps: Arc<InMemoryStepStore>,
    pub ui: Arc<ScriptedUser>,
    pub files: Arc<InMemoryFiles>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_steps(Arc::new(InMemoryStepStore::new()))
    }

    /// Fresh mocks over an existing step store, as a second run would see it
    pub fn with_steps(steps: Arc<InMemoryStepStore>) -> Self {
        let llm = Arc::new(MockLlmClient::new("mock-model"));
        let ui = Arc::new(ScriptedUser::new());
        let files = Arc::new(InMemoryFiles::new());
        let deps = Collaborators::new(
            steps.clone(),
            llm.clone(),
            Arc::new(EchoPrompts),
            ui.clone(),
            files.clone(),
        );
        Self {
            deps,
            llm,
            steps,
            ui,
            files,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
