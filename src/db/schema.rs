//! Database schema

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS development_steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    hash_id TEXT NOT NULL,
    prompt_path TEXT,
    prompt_data TEXT NOT NULL,
    llm_req_num INTEGER NOT NULL,
    messages TEXT NOT NULL,
    llm_response TEXT NOT NULL,
    previous_step INTEGER,
    high_level_step TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_steps_identity ON development_steps(project_id, hash_id);
CREATE INDEX IF NOT EXISTS idx_steps_project ON development_steps(project_id, id);

-- One row per snapshotted step, so an empty snapshot is told apart from none
CREATE TABLE IF NOT EXISTS snapshot_steps (
    step_id INTEGER PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS file_snapshots (
    step_id INTEGER NOT NULL,
    path TEXT NOT NULL,
    content TEXT NOT NULL,

    PRIMARY KEY (step_id, path)
);
";

/// Columns selected for a step row, in `parse_step_row` order
pub const STEP_COLUMNS: &str = "id, project_id, hash_id, prompt_path, prompt_data, llm_req_num, \
     messages, llm_response, previous_step, high_level_step, created_at";
