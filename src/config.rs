//! Environment-driven configuration

use crate::session::ReplayPolicy;
use std::path::PathBuf;

/// Where steps live and how a run should treat them
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    pub db_path: Option<PathBuf>,
    pub project_id: String,
    /// Replay recorded steps until this id, then continue live
    pub skip_until_step: Option<i64>,
    /// Replay every recorded step without a stopping point
    pub replay_all: bool,
    pub delete_unrelated_steps: bool,
}

impl ReplayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: get("CONVO_DB_PATH").map(PathBuf::from),
            project_id: get("CONVO_PROJECT_ID").unwrap_or_else(|| "default".to_string()),
            skip_until_step: get("CONVO_SKIP_UNTIL_STEP").and_then(|v| v.trim().parse().ok()),
            replay_all: get("CONVO_REPLAY").is_some_and(|v| parse_flag(&v)),
            delete_unrelated_steps: get("CONVO_DELETE_UNRELATED_STEPS")
                .is_some_and(|v| parse_flag(&v)),
        }
    }

    /// Database path, defaulting to `~/.agent-convo/steps.db`
    pub fn db_path_or_default(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(format!("{home}/.agent-convo/steps.db"))
        })
    }

    pub fn replay_policy(&self) -> ReplayPolicy {
        ReplayPolicy {
            skip_steps: self.replay_all || self.skip_until_step.is_some(),
            skip_until_step: self.skip_until_step,
            delete_unrelated_steps: self.delete_unrelated_steps,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
