//! Checkpoint index: recorded (request, response) steps keyed by identity
//!
//! A step's identity is derived from the prompt reference, its parameters and
//! the session's running request number. The counter is part of the identity
//! because an agent can send the same prompt several times in one session and
//! each occurrence has to resolve to its own recorded step.
//!
//! Storage is append-only: recording an identity that already exists adds a
//! new row, and lookups resolve to the most recent row for the identity.

use crate::error::{ConvoError, ConvoResult};
use crate::llm::{LlmResponse, Message};
use crate::runtime::StepStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Identity of a request within a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepKey {
    pub project_id: String,
    pub prompt_path: Option<String>,
    pub prompt_data: Value,
    pub llm_req_num: u64,
}

impl StepKey {
    pub fn new(
        project_id: impl Into<String>,
        prompt_path: Option<&str>,
        prompt_data: Option<&Value>,
        llm_req_num: u64,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            prompt_path: prompt_path.map(String::from),
            prompt_data: prompt_data.cloned().unwrap_or(Value::Null),
            llm_req_num,
        }
    }

    /// Stable hex SHA-256 over the canonical JSON of the prompt triple.
    ///
    /// `serde_json` maps keep keys sorted, so equal parameters always hash the
    /// same regardless of insertion order.
    pub fn hash_id(&self) -> String {
        let canonical = json!({
            "prompt_path": self.prompt_path,
            "prompt_data": self.prompt_data,
            "llm_req_num": self.llm_req_num,
        });
        format!("{:x}", Sha256::digest(canonical.to_string().as_bytes()))
    }
}

/// A recorded step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub project_id: String,
    pub hash_id: String,
    pub prompt_path: Option<String>,
    pub prompt_data: Value,
    pub llm_req_num: u64,
    /// Exact outgoing messages at the time of the request
    pub messages: Vec<Message>,
    pub llm_response: LlmResponse,
    /// Step that was current when this one was recorded
    pub previous_step: Option<i64>,
    pub high_level_step: String,
    pub created_at: DateTime<Utc>,
}

/// A step about to be recorded
#[derive(Debug, Clone)]
pub struct NewStep {
    pub key: StepKey,
    pub messages: Vec<Message>,
    pub llm_response: LlmResponse,
    pub previous_step: Option<i64>,
    pub high_level_step: String,
}

/// Lookup/record front for the step store
#[derive(Clone)]
pub struct CheckpointIndex {
    store: Arc<dyn StepStore>,
}

impl CheckpointIndex {
    pub fn new(store: Arc<dyn StepStore>) -> Self {
        Self { store }
    }

    /// Most recent step recorded for `key`, if any. Never writes.
    pub async fn lookup(&self, key: &StepKey) -> ConvoResult<Option<Step>> {
        let hash_id = key.hash_id();
        let step = self
            .store
            .lookup_step(&key.project_id, &hash_id)
            .await
            .map_err(ConvoError::persistence)?;
        tracing::debug!(
            project_id = %key.project_id,
            hash_id = %hash_id,
            llm_req_num = key.llm_req_num,
            hit = step.is_some(),
            "Checkpoint lookup"
        );
        Ok(step)
    }

    /// Persist a new step. Always appends, even if the identity exists.
    pub async fn record(
        &self,
        key: &StepKey,
        messages: &[Message],
        response: &LlmResponse,
        previous_step: Option<i64>,
        high_level_step: &str,
    ) -> ConvoResult<Step> {
        let new_step = NewStep {
            key: key.clone(),
            messages: messages.to_vec(),
            llm_response: response.clone(),
            previous_step,
            high_level_step: high_level_step.to_string(),
        };
        let step = self
            .store
            .save_step(&new_step)
            .await
            .map_err(ConvoError::persistence)?;
        tracing::info!(
            step_id = step.id,
            project_id = %step.project_id,
            llm_req_num = step.llm_req_num,
            "Recorded development step"
        );
        Ok(step)
    }

    /// Delete every step of the project recorded after `step`
    pub async fn truncate_after(&self, step: &Step) -> ConvoResult<usize> {
        let deleted = self
            .store
            .truncate_after(&step.project_id, step.id)
            .await
            .map_err(ConvoError::persistence)?;
        tracing::info!(step_id = step.id, deleted, "Truncated steps after resumption point");
        Ok(deleted)
    }

    /// Delete every step of the project that is not an ancestor of `step`
    pub async fn prune_unrelated(&self, step: &Step) -> ConvoResult<usize> {
        let deleted = self
            .store
            .delete_unrelated(&step.project_id, step.id)
            .await
            .map_err(ConvoError::persistence)?;
        tracing::info!(step_id = step.id, deleted, "Pruned steps outside the current branch");
        Ok(deleted)
    }
}
