//! Per-session state shared by every conversation of one project
//!
//! Created at session start, mutated only by the conversation controller, and
//! dropped at session end. Nothing here is global.

use crate::checkpoint::Step;
use crate::config::ReplayConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which agent owns a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    ProductOwner,
    Architect,
    TechLead,
    Developer,
    CodeMonkey,
    TechnicalWriter,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::ProductOwner => "product_owner",
            AgentRole::Architect => "architect",
            AgentRole::TechLead => "tech_lead",
            AgentRole::Developer => "developer",
            AgentRole::CodeMonkey => "code_monkey",
            AgentRole::TechnicalWriter => "technical_writer",
        }
    }

    /// Whether this role's requests advance the session request counter
    pub fn owns_request_counter(self) -> bool {
        matches!(self, AgentRole::Developer)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How recorded steps are trusted on this run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayPolicy {
    /// Replay mode: checkpoint hits are reused instead of calling the model
    pub skip_steps: bool,
    /// Step id at which replay stops and the recorded future is discarded
    pub skip_until_step: Option<i64>,
    /// Also delete steps that are not on the boundary step's branch
    pub delete_unrelated_steps: bool,
}

impl ReplayPolicy {
    /// Replay every hit and never stop
    pub fn replay_all() -> Self {
        Self {
            skip_steps: true,
            ..Self::default()
        }
    }

    /// Replay hits until `step_id` is reached
    pub fn replay_until(step_id: i64) -> Self {
        Self {
            skip_steps: true,
            skip_until_step: Some(step_id),
            delete_unrelated_steps: false,
        }
    }

    pub fn is_boundary(&self, step_id: i64) -> bool {
        self.skip_until_step == Some(step_id)
    }
}

/// Explicit session state passed into every turn
#[derive(Debug, Clone)]
pub struct Session {
    pub project_id: String,
    /// High-level step the project is in (e.g. `project_description`)
    pub current_step: String,
    /// Running count of billed requests; part of every checkpoint identity
    pub llm_req_num: u64,
    pub replay: ReplayPolicy,
    /// The step considered current for the project
    pub last_step: Option<Step>,
}

impl Session {
    pub fn new(project_id: impl Into<String>, current_step: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            current_step: current_step.into(),
            llm_req_num: 0,
            replay: ReplayPolicy::default(),
            last_step: None,
        }
    }

    pub fn from_config(config: &ReplayConfig, current_step: impl Into<String>) -> Self {
        Self::new(config.project_id.clone(), current_step).with_replay(config.replay_policy())
    }

    #[must_use]
    pub fn with_replay(mut self, replay: ReplayPolicy) -> Self {
        self.replay = replay;
        self
    }

    pub fn is_replaying(&self) -> bool {
        self.replay.skip_steps
    }

    pub fn last_step_id(&self) -> Option<i64> {
        self.last_step.as_ref().map(|s| s.id)
    }

    /// Advance the request counter if `role` owns it, returning the value to
    /// use for this request's identity
    pub fn next_request_number(&mut self, role: AgentRole) -> u64 {
        if role.owns_request_counter() {
            self.llm_req_num += 1;
        }
        self.llm_req_num
    }
}
