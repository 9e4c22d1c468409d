//! Persistence of the board state.
//!
//! The whole `TaskState` is stored as one JSON document (`task-storage.json` by default).
//! Writes go through a temp file and a rename so a crash mid-write never leaves a
//! truncated blob behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::task::TaskState;

/// File name of the persisted blob inside the data directory.
pub const STATE_FILE: &str = "task-storage.json";

/// Handle on the persisted state blob.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Database { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, or an empty state if nothing has been saved yet.
    pub fn load(&self) -> Result<TaskState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no saved state, starting empty");
            return Ok(TaskState::default());
        }
        let buf = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(serde_json::from_str(&buf)?)
    }

    /// Save the state using an atomic write (temp file + rename).
    pub fn save(&self, state: &TaskState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(state)?;
        let mut f = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(data.as_bytes()).map_err(|e| StoreError::io(&tmp, e))?;
        f.flush().map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        info!(path = %self.path.display(), groups = state.task_groups.len(), "saved state");
        Ok(())
    }

    /// Copy the current blob into `backup/` next to it, prefixed with a timestamp.
    pub fn create_backup(&self) -> Result<PathBuf> {
        if !self.path.exists() {
            return Err(StoreError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "state file does not exist"),
            ));
        }

        let parent_dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let backup_dir = parent_dir.join("backup");
        fs::create_dir_all(&backup_dir).map_err(|e| StoreError::io(&backup_dir, e))?;

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(STATE_FILE);
        let backup_path = backup_dir.join(format!("{timestamp}_{file_name}"));

        fs::copy(&self.path, &backup_path).map_err(|e| StoreError::io(&backup_path, e))?;
        info!(path = %backup_path.display(), "created backup");
        Ok(backup_path)
    }
}
