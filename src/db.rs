//! Database module
//!
//! Provides persistence for recorded steps and per-step file snapshots.

mod schema;

use schema::{SCHEMA, STEP_COLUMNS};

use crate::checkpoint::{NewStep, Step};
use crate::file_refs::ProjectFile;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Step not found: {0}")]
    StepNotFound(i64),
    #[error("Request number out of range: {0}")]
    RequestNumber(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Step Operations ====================

    /// Append a step and return it with its assigned id
    pub fn insert_step(&self, step: &NewStep) -> DbResult<Step> {
        let conn = self.lock()?;
        let now = Utc::now();
        let hash_id = step.key.hash_id();
        let prompt_data = serde_json::to_string(&step.key.prompt_data)?;
        let messages = serde_json::to_string(&step.messages)?;
        let llm_response = serde_json::to_string(&step.llm_response)?;
        let req_num = i64::try_from(step.key.llm_req_num)
            .map_err(|_| DbError::RequestNumber(step.key.llm_req_num.to_string()))?;

        conn.execute(
            "INSERT INTO development_steps (project_id, hash_id, prompt_path, prompt_data, llm_req_num,
                                            messages, llm_response, previous_step, high_level_step, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                step.key.project_id,
                hash_id,
                step.key.prompt_path,
                prompt_data,
                req_num,
                messages,
                llm_response,
                step.previous_step,
                step.high_level_step,
                now.to_rfc3339(),
            ],
        )?;

        Ok(Step {
            id: conn.last_insert_rowid(),
            project_id: step.key.project_id.clone(),
            hash_id,
            prompt_path: step.key.prompt_path.clone(),
            prompt_data: step.key.prompt_data.clone(),
            llm_req_num: step.key.llm_req_num,
            messages: step.messages.clone(),
            llm_response: step.llm_response.clone(),
            previous_step: step.previous_step,
            high_level_step: step.high_level_step.clone(),
            created_at: now,
        })
    }

    /// Most recent step for an identity
    pub fn find_step(&self, project_id: &str, hash_id: &str) -> DbResult<Option<Step>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {STEP_COLUMNS} FROM development_steps
                     WHERE project_id = ?1 AND hash_id = ?2
                     ORDER BY id DESC LIMIT 1"
                ),
                params![project_id, hash_id],
                parse_step_row,
            )
            .optional()?;
        row.map(StepRow::into_step).transpose()
    }

    /// Get step by ID
    pub fn get_step(&self, id: i64) -> DbResult<Step> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {STEP_COLUMNS} FROM development_steps WHERE id = ?1"),
            params![id],
            parse_step_row,
        )
        .optional()?
        .ok_or(DbError::StepNotFound(id))?
        .into_step()
    }

    /// List steps in recording order, optionally for one project
    pub fn list_steps(&self, project_id: Option<&str>) -> DbResult<Vec<Step>> {
        let conn = self.lock()?;
        let rows = match project_id {
            Some(project_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STEP_COLUMNS} FROM development_steps WHERE project_id = ?1 ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map(params![project_id], parse_step_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STEP_COLUMNS} FROM development_steps ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map([], parse_step_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        rows.into_iter().map(StepRow::into_step).collect()
    }

    /// Delete every step of the project recorded after `step_id`
    pub fn delete_steps_after(&self, project_id: &str, step_id: i64) -> DbResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for table in ["file_snapshots", "snapshot_steps"] {
            tx.execute(
                &format!(
                    "DELETE FROM {table} WHERE step_id IN
                        (SELECT id FROM development_steps WHERE project_id = ?1 AND id > ?2)"
                ),
                params![project_id, step_id],
            )?;
        }
        let deleted = tx.execute(
            "DELETE FROM development_steps WHERE project_id = ?1 AND id > ?2",
            params![project_id, step_id],
        )?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Delete every step of the project that is neither `step_id` nor one of
    /// its ancestors through `previous_step`
    pub fn delete_steps_off_branch(&self, project_id: &str, step_id: i64) -> DbResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let parents: HashMap<i64, Option<i64>> = {
            let mut stmt = tx.prepare(
                "SELECT id, previous_step FROM development_steps WHERE project_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![project_id], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?))
                })?
                .collect::<Result<HashMap<_, _>, _>>()?;
            rows
        };
        if !parents.contains_key(&step_id) {
            return Err(DbError::StepNotFound(step_id));
        }

        let mut keep = HashSet::new();
        let mut cursor = Some(step_id);
        while let Some(id) = cursor {
            if !keep.insert(id) {
                break;
            }
            cursor = parents.get(&id).copied().flatten();
        }

        let mut deleted = 0;
        for id in parents.keys().filter(|id| !keep.contains(id)) {
            tx.execute("DELETE FROM file_snapshots WHERE step_id = ?1", params![id])?;
            tx.execute("DELETE FROM snapshot_steps WHERE step_id = ?1", params![id])?;
            deleted += tx.execute("DELETE FROM development_steps WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    // ==================== File Snapshot Operations ====================

    /// Replace the snapshot stored for `step_id`
    pub fn save_file_snapshot(&self, step_id: i64, files: &[ProjectFile]) -> DbResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM file_snapshots WHERE step_id = ?1", params![step_id])?;
        tx.execute(
            "INSERT OR REPLACE INTO snapshot_steps (step_id, created_at) VALUES (?1, ?2)",
            params![step_id, Utc::now().to_rfc3339()],
        )?;
        for file in files {
            tx.execute(
                "INSERT INTO file_snapshots (step_id, path, content) VALUES (?1, ?2, ?3)",
                params![step_id, file.path, file.content],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Files recorded for `step_id`, or `None` if the step was never
    /// snapshotted
    pub fn get_file_snapshot(&self, step_id: i64) -> DbResult<Option<Vec<ProjectFile>>> {
        let conn = self.lock()?;
        let snapshotted = conn
            .query_row(
                "SELECT 1 FROM snapshot_steps WHERE step_id = ?1",
                params![step_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !snapshotted {
            return Ok(None);
        }
        let mut stmt = conn
            .prepare("SELECT path, content FROM file_snapshots WHERE step_id = ?1 ORDER BY path")?;
        let files = stmt
            .query_map(params![step_id], |row| {
                Ok(ProjectFile {
                    path: row.get(0)?,
                    content: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(files))
    }
}

/// Raw column values of a step row; JSON is decoded afterwards
struct StepRow {
    id: i64,
    project_id: String,
    hash_id: String,
    prompt_path: Option<String>,
    prompt_data: String,
    llm_req_num: i64,
    messages: String,
    llm_response: String,
    previous_step: Option<i64>,
    high_level_step: String,
    created_at: String,
}

impl StepRow {
    fn into_step(self) -> DbResult<Step> {
        Ok(Step {
            id: self.id,
            project_id: self.project_id,
            hash_id: self.hash_id,
            prompt_path: self.prompt_path,
            prompt_data: serde_json::from_str(&self.prompt_data)?,
            llm_req_num: u64::try_from(self.llm_req_num)
                .map_err(|_| DbError::RequestNumber(self.llm_req_num.to_string()))?,
            messages: serde_json::from_str(&self.messages)?,
            llm_response: serde_json::from_str(&self.llm_response)?,
            previous_step: self.previous_step,
            high_level_step: self.high_level_step,
            created_at: parse_datetime(&self.created_at),
        })
    }
}

fn parse_step_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StepRow> {
    Ok(StepRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        hash_id: row.get(2)?,
        prompt_path: row.get(3)?,
        prompt_data: row.get(4)?,
        llm_req_num: row.get(5)?,
        messages: row.get(6)?,
        llm_response: row.get(7)?,
        previous_step: row.get(8)?,
        high_level_step: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
