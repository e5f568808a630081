//! Event journal - append-only JSONL audit trail
//!
//! One line per actuation attempt, plus startup and shutdown. Nothing is
//! ever read back; arbiter state always starts fresh.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use radiogate_common::Action;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEvent {
    Startup,
    Actuation,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: DateTime<Utc>,
    pub event: JournalEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub details: String,
}

impl JournalEntry {
    pub fn startup(details: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            event: JournalEvent::Startup,
            action: None,
            success: None,
            details: details.into(),
        }
    }

    pub fn actuation(action: Action, success: bool, details: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            event: JournalEvent::Actuation,
            action: Some(action),
            success: Some(success),
            details: details.into(),
        }
    }

    pub fn shutdown() -> Self {
        Self {
            ts: Utc::now(),
            event: JournalEvent::Shutdown,
            action: None,
            success: None,
            details: String::new(),
        }
    }
}

/// Disabled when no path is configured.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    path: Option<PathBuf>,
}

impl Journal {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Best effort: failures are logged, never returned.
    pub async fn record(&self, entry: JournalEntry) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_entry(path, &entry).await {
            warn!("Failed to write journal entry: {:#}", e);
        }
    }
}

async fn write_entry(path: &Path, entry: &JournalEntry) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir)
            .await
            .context("Failed to create journal directory")?;
    }

    let json = serde_json::to_string(entry)? + "\n";

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open journal {}", path.display()))?;

    file.write_all(json.as_bytes())
        .await
        .context("Failed to write journal entry")?;

    file.sync_all().await.context("Failed to sync journal")?;

    Ok(())
}
