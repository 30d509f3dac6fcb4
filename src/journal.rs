//! Run journal
//!
//! Appends one JSON line per bootstrap event to
//! `<workspace>/.wavestrap/journal.log`, tagged with a per-run id.

use crate::config::ConfigManager;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// File-based journal that appends JSON lines
pub struct RunJournal {
    enabled: bool,
    run_id: Uuid,
    path: PathBuf,
    // Units of one batch report concurrently; keep lines whole
    write_lock: Mutex<()>,
}

impl RunJournal {
    /// Create a journal for a new run in `workspace_root`
    pub fn new(workspace_root: &Path, enabled: bool) -> Self {
        Self::at_path(ConfigManager::journal_path(workspace_root), enabled)
    }

    /// A journal that drops every event
    pub fn disabled() -> Self {
        Self::at_path(PathBuf::new(), false)
    }

    fn at_path(path: PathBuf, enabled: bool) -> Self {
        Self {
            enabled,
            run_id: Uuid::new_v4(),
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record an event as a JSON line
    ///
    /// IO failures are logged and dropped; the journal never fails a run.
    pub async fn record(&self, event: &str, data: serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "run_id": self.run_id.to_string(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event: {}", e);
                return;
            }
        };
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
