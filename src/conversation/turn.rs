//! One turn of a conversation, and the multi-turn loop built on it
//!
//! A turn runs `Building -> CheckCheckpoint -> (Replaying | Invoking) ->
//! PostProcessing -> Appending -> Logged`. A recorded step is only trusted
//! while the session is in replay mode; otherwise the model is called and the
//! exchange is recorded as a new step.

use super::Conversation;
use crate::checkpoint::{Step, StepKey};
use crate::error::{ConvoError, ConvoResult};
use crate::llm::{LlmRequest, LlmResponse, Message, Role};
use crate::postprocess::{postprocess, render_reply, FunctionCalls, Reply};
use crate::session::Session;
use serde_json::Value;
use std::fmt;

const JSON_REMINDER: &str = "\nMAKE SURE THAT YOU RESPOND WITH A CORRECT JSON FORMAT!!!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Building,
    CheckCheckpoint,
    Replaying,
    Invoking,
    PostProcessing,
    Appending,
    Logged,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::Building => "building",
            TurnPhase::CheckCheckpoint => "check_checkpoint",
            TurnPhase::Replaying => "replaying",
            TurnPhase::Invoking => "invoking",
            TurnPhase::PostProcessing => "post_processing",
            TurnPhase::Appending => "appending",
            TurnPhase::Logged => "logged",
        };
        f.write_str(name)
    }
}

/// A prompt template and the parameters to render it with
#[derive(Debug, Clone, Copy)]
pub struct PromptRef<'a> {
    pub path: &'a str,
    pub data: &'a Value,
}

impl<'a> PromptRef<'a> {
    pub fn new(path: &'a str, data: &'a Value) -> Self {
        Self { path, data }
    }
}

impl Conversation {
    /// Run one turn.
    ///
    /// With a prompt, it is rendered into a new user message; without one the
    /// existing history is sent as is (the caller already appended a reply).
    pub async fn send_message(
        &mut self,
        session: &mut Session,
        prompt: Option<PromptRef<'_>>,
        functions: Option<&FunctionCalls>,
    ) -> ConvoResult<Reply> {
        self.enter(TurnPhase::Building);
        if let Some(prompt) = prompt {
            let text = self
                .deps
                .prompts
                .render(prompt.path, prompt.data)
                .map_err(ConvoError::Prompt)?;
            self.messages.push(Message::user(text));
        }
        if functions.is_some_and(|f| !f.definitions().is_empty()) {
            self.add_json_reminder();
        }

        self.enter(TurnPhase::CheckCheckpoint);
        // Only the counter owner's turns have distinct identities, so only
        // they are checkpointed
        let key = self.role.owns_request_counter().then(|| {
            let llm_req_num = session.next_request_number(self.role);
            StepKey::new(
                session.project_id.as_str(),
                prompt.map(|p| p.path),
                prompt.map(|p| p.data),
                llm_req_num,
            )
        });
        let recorded = match &key {
            Some(key) => self.deps.checkpoints.lookup(key).await?,
            None => None,
        };

        let response = match recorded {
            Some(step) if session.is_replaying() => self.replay_step(session, step).await?,
            _ => self.invoke(session, key.as_ref(), functions).await?,
        };

        self.enter(TurnPhase::PostProcessing);
        let reply = postprocess(response, functions, self)?;

        self.enter(TurnPhase::Appending);
        let content = render_reply(&reply, functions);
        self.messages.push(Message::assistant(content.as_str()));

        self.log_message(session, &content);
        self.enter(TurnPhase::Logged);
        Ok(reply)
    }

    /// Keep taking turns, feeding back the human's answer each time, until
    /// the model signals the end.
    ///
    /// Returns every reply the human accepted by answering with empty input,
    /// in turn order. Echo to the observer is off while the loop runs.
    pub async fn continuous_conversation(
        &mut self,
        session: &mut Session,
        prompt: Option<PromptRef<'_>>,
        functions: Option<&FunctionCalls>,
    ) -> ConvoResult<Vec<Reply>> {
        self.log_to_user = false;
        let result = self.converse_until_end(session, prompt, functions).await;
        self.log_to_user = true;
        result
    }

    async fn converse_until_end(
        &mut self,
        session: &mut Session,
        prompt: Option<PromptRef<'_>>,
        functions: Option<&FunctionCalls>,
    ) -> ConvoResult<Vec<Reply>> {
        let mut accepted = Vec::new();
        let mut reply = self.send_message(session, prompt, functions).await?;

        while !reply.is_end() {
            let user_message = self
                .deps
                .ui
                .ask_human(&session.project_id, &reply, true)
                .await
                .map_err(ConvoError::Interaction)?;

            if user_message.is_empty() {
                accepted.push(reply);
            }

            self.messages.push(Message::user(user_message));
            reply = self.send_message(session, None, functions).await?;
        }

        Ok(accepted)
    }

    /// Adopt a recorded step: its files, its exact messages and its response
    async fn replay_step(&mut self, session: &mut Session, step: Step) -> ConvoResult<LlmResponse> {
        self.enter(TurnPhase::Replaying);
        tracing::info!(step_id = step.id, "Restoring development step");

        self.deps
            .files
            .restore_files(step.id)
            .await
            .map_err(ConvoError::file_state)?;
        self.messages.clone_from(&step.messages);
        let response = step.llm_response.clone();

        if session.replay.is_boundary(step.id) {
            session.replay.skip_steps = false;
            self.deps.checkpoints.truncate_after(&step).await?;
            if session.replay.delete_unrelated_steps {
                self.deps.checkpoints.prune_unrelated(&step).await?;
            }
            tracing::info!(step_id = step.id, "Reached resumption point, continuing live");
        }

        session.last_step = Some(step);
        Ok(response)
    }

    /// Call the model with the live messages and record the exchange when the
    /// turn has a checkpoint identity
    async fn invoke(
        &mut self,
        session: &mut Session,
        key: Option<&StepKey>,
        functions: Option<&FunctionCalls>,
    ) -> ConvoResult<LlmResponse> {
        self.enter(TurnPhase::Invoking);
        let request = LlmRequest {
            messages: self.messages.clone(),
            step: self.high_level_step.clone(),
            functions: functions.map_or_else(Vec::new, |f| f.definitions().to_vec()),
        };

        let response = self.deps.llm.complete(&request).await?;
        if response.is_empty() {
            tracing::error!(step = %self.high_level_step, "LLM returned an empty response");
            return Err(ConvoError::Backend(
                "LLM returned an empty response".to_string(),
            ));
        }

        let Some(key) = key else {
            return Ok(response);
        };
        let step = self
            .deps
            .checkpoints
            .record(
                key,
                &request.messages,
                &response,
                session.last_step_id(),
                &self.high_level_step,
            )
            .await?;
        self.deps
            .files
            .snapshot_files(step.id)
            .await
            .map_err(ConvoError::file_state)?;
        session.last_step = Some(step);
        Ok(response)
    }

    fn add_json_reminder(&mut self) {
        if let Some(last) = self
            .messages
            .last_mut()
            .filter(|m| m.role != Role::System)
        {
            last.content.push_str(JSON_REMINDER);
        }
    }

    fn log_message(&self, session: &Session, content: &str) {
        let step_id = session.last_step_id();
        if self.log_to_user {
            self.deps.ui.show(step_id, content);
        }
        tracing::info!(
            role = %self.role,
            step_id = ?step_id,
            "{}: {content}",
            display_step_name(&self.high_level_step)
        );
    }

    fn enter(&mut self, phase: TurnPhase) {
        tracing::trace!(role = %self.role, %phase, "Turn phase");
        self.phase = phase;
    }
}

/// `development_planning` -> `Development planning`
pub fn display_step_name(step: &str) -> String {
    let mut words = step.split('_');
    let first = words.next().map_or_else(String::new, capitalize);
    std::iter::once(first)
        .chain(words.map(String::from))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
