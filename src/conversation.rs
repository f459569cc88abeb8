//! A conversation between one agent and the model
//!
//! Owns the ordered message list sent with every request, plus named branch
//! snapshots of it. The system message sits at index 0 for the whole life of
//! the conversation.

mod turn;

#[cfg(test)]
mod proptests;

pub use turn::{display_step_name, PromptRef, TurnPhase};

use crate::error::{ConvoError, ConvoResult};
use crate::file_refs::rewrite_file_refs;
use crate::llm::{Message, Role};
use crate::runtime::Collaborators;
use crate::session::{AgentRole, Session};
use std::collections::HashMap;
use std::fmt;

pub struct Conversation {
    messages: Vec<Message>,
    branches: HashMap<String, Vec<Message>>,
    /// Echo turns to the interactive observer
    pub log_to_user: bool,
    role: AgentRole,
    high_level_step: String,
    phase: TurnPhase,
    deps: Collaborators,
}

impl Conversation {
    /// Start a conversation for `role`, seeded with its system message
    pub fn new(role: AgentRole, session: &Session, deps: Collaborators) -> ConvoResult<Self> {
        let system = deps
            .prompts
            .system_message(role)
            .map_err(ConvoError::Prompt)?;
        Ok(Self {
            messages: vec![Message::system(system)],
            branches: HashMap::new(),
            log_to_user: true,
            role,
            high_level_step: session.current_step.clone(),
            phase: TurnPhase::Logged,
            deps,
        })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn high_level_step(&self) -> &str {
        &self.high_level_step
    }

    /// Phase the most recent turn reached
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Append a user or assistant message
    pub fn append(&mut self, message: Message) -> ConvoResult<()> {
        if message.role == Role::System {
            return Err(ConvoError::InvalidMessage(
                "a conversation has exactly one system message".to_string(),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Drop the last `n` messages. The system message is never dropped.
    pub fn truncate_last(&mut self, n: usize) {
        let keep = self.messages.len().saturating_sub(n).max(1);
        self.messages.truncate(keep);
    }

    /// Number of messages excluding the system message
    pub fn active_length(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .count()
    }

    /// Store a copy of the current messages under `name`
    pub fn save_branch(&mut self, name: impl Into<String>) {
        self.branches.insert(name.into(), self.messages.clone());
    }

    /// Replace the live messages with a copy of branch `name`
    pub fn restore_branch(&mut self, name: &str) -> ConvoResult<()> {
        let snapshot = self
            .branches
            .get(name)
            .ok_or_else(|| ConvoError::UnknownBranch(name.to_string()))?;
        self.messages.clone_from(snapshot);
        Ok(())
    }

    /// Restore branch `name`, then optionally refresh embedded file blocks
    /// from the current project files
    pub async fn load_branch(&mut self, name: &str, reload_files: bool) -> ConvoResult<()> {
        self.restore_branch(name)?;
        if reload_files {
            self.replace_files().await?;
        }
        Ok(())
    }

    /// Refresh every embedded file block in user messages
    pub async fn replace_files(&mut self) -> ConvoResult<usize> {
        let files = self
            .deps
            .files
            .list_current_files()
            .await
            .map_err(ConvoError::file_state)?;
        let replaced = rewrite_file_refs(&mut self.messages, &files);
        tracing::debug!(files = files.len(), replaced, "Reloaded file contents into messages");
        Ok(replaced)
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut branches: Vec<_> = self.branches.keys().collect();
        branches.sort();
        f.debug_struct("Conversation")
            .field("role", &self.role)
            .field("high_level_step", &self.high_level_step)
            .field("messages", &self.messages.len())
            .field("branches", &branches)
            .field("log_to_user", &self.log_to_user)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
