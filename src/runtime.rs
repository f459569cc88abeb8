//! Collaborators wired into a conversation
//!
//! The conversation core owns no I/O of its own: persistence, the model
//! transport, prompt rendering, the human at the terminal and the project
//! files all come in through the traits in [`traits`].

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::checkpoint::CheckpointIndex;
use std::sync::Arc;

/// Everything a conversation talks to
#[derive(Clone)]
pub struct Collaborators {
    pub checkpoints: CheckpointIndex,
    pub llm: Arc<dyn LlmClient>,
    pub prompts: Arc<dyn PromptRenderer>,
    pub ui: Arc<dyn UserInterface>,
    pub files: Arc<dyn ProjectFiles>,
}

impl Collaborators {
    pub fn new(
        steps: Arc<dyn StepStore>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<dyn PromptRenderer>,
        ui: Arc<dyn UserInterface>,
        files: Arc<dyn ProjectFiles>,
    ) -> Self {
        Self {
            checkpoints: CheckpointIndex::new(steps),
            llm,
            prompts,
            ui,
            files,
        }
    }
}
