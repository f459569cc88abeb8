//! Project files on disk, with per-step snapshots kept in the database

use crate::db::Database;
use crate::file_refs::ProjectFile;
use crate::runtime::ProjectFiles;
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::PathBuf;

/// Files under `root`, honouring `.gitignore` and skipping hidden entries
#[derive(Clone)]
pub struct WorkspaceFiles {
    root: PathBuf,
    db: Database,
}

impl WorkspaceFiles {
    pub fn new(root: impl Into<PathBuf>, db: Database) -> Self {
        Self {
            root: root.into(),
            db,
        }
    }

    fn scan(&self) -> Vec<ProjectFile> {
        let mut builder = WalkBuilder::new(&self.root);
        builder.follow_links(false);
        builder.require_git(false);

        let mut files = Vec::new();
        for entry in builder.build() {
            let Ok(entry) = entry else {
                continue;
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            match std::fs::read_to_string(path) {
                Ok(content) => files.push(ProjectFile {
                    path: rel.to_string_lossy().replace('\\', "/"),
                    content,
                }),
                // Binary or unreadable files are not tracked
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping file"),
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }
}

#[async_trait]
impl ProjectFiles for WorkspaceFiles {
    async fn list_current_files(&self) -> Result<Vec<ProjectFile>, String> {
        Ok(self.scan())
    }

    async fn restore_files(&self, step_id: i64) -> Result<(), String> {
        let Some(snapshot) = self
            .db
            .get_file_snapshot(step_id)
            .map_err(|e| e.to_string())?
        else {
            tracing::warn!(step_id, "No file snapshot for step, leaving workspace as is");
            return Ok(());
        };

        let keep: HashSet<&str> = snapshot.iter().map(|f| f.path.as_str()).collect();
        for stale in self.scan().iter().filter(|f| !keep.contains(f.path.as_str())) {
            tokio::fs::remove_file(self.root.join(&stale.path))
                .await
                .map_err(|e| format!("Failed to remove {}: {e}", stale.path))?;
        }

        for file in &snapshot {
            let target = self.root.join(&file.path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
            }
            tokio::fs::write(&target, &file.content)
                .await
                .map_err(|e| format!("Failed to write {}: {e}", file.path))?;
        }

        tracing::info!(step_id, files = snapshot.len(), "Restored workspace files");
        Ok(())
    }

    async fn snapshot_files(&self, step_id: i64) -> Result<(), String> {
        let files = self.scan();
        self.db
            .save_file_snapshot(step_id, &files)
            .map_err(|e| e.to_string())?;
        tracing::debug!(step_id, files = files.len(), "Saved file snapshot");
        Ok(())
    }
}
