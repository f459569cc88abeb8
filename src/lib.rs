//! Replayable agent conversations
//!
//! Every model call an agent makes is recorded as a step keyed by its prompt
//! and its position in the session. A later run can replay those steps up to
//! a chosen point instead of calling the model again, then continue live.

pub mod checkpoint;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod file_refs;
pub mod llm;
pub mod postprocess;
pub mod runtime;
pub mod session;
pub mod workspace;

pub use checkpoint::{CheckpointIndex, Step, StepKey};
pub use config::ReplayConfig;
pub use conversation::{Conversation, PromptRef, TurnPhase};
pub use error::{ConvoError, ConvoResult};
pub use postprocess::{FunctionCalls, Reply};
pub use runtime::Collaborators;
pub use session::{AgentRole, ReplayPolicy, Session};
