use crate::entities::{EngineStatus, FileEntry, InfoHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Added,
    MetadataPending,
    Ready,
    Error,
    Dropped,
}

/// Gateway-side bookkeeping for one torrent, keyed by info hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSession {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub state: SessionState,
    pub files: Vec<FileEntry>,
    pub last_status: Option<EngineStatus>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TorrentSession {
    pub fn new(info_hash: InfoHash, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            info_hash,
            display_name,
            state: SessionState::Added,
            files: Vec::new(),
            last_status: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Folds one engine observation into the session.
    ///
    /// `Added` moves to `MetadataPending` once the engine knows the torrent,
    /// and to `Ready` as soon as a non-empty file list is seen. A ready
    /// session keeps its last known files if a later listing comes back empty.
    pub fn observe(&mut self, status: &EngineStatus, files: Vec<FileEntry>) {
        if status.is_errored() {
            self.state = SessionState::Error;
            self.last_error = Some(format!("engine reported state {}", status.state));
        } else if !files.is_empty() {
            self.files = files;
            self.state = SessionState::Ready;
            self.last_error = None;
        } else if self.state == SessionState::Added {
            self.state = SessionState::MetadataPending;
        }

        if self.display_name.is_none() {
            self.display_name = status.name.clone();
        }
        self.last_status = Some(status.clone());
        self.updated_at = Utc::now();
    }

    /// Records a file list obtained without a status snapshot.
    pub fn record_files(&mut self, files: Vec<FileEntry>) {
        if !files.is_empty() {
            self.files = files;
            self.state = SessionState::Ready;
            self.updated_at = Utc::now();
        }
    }

    pub fn mark_dropped(&mut self) {
        self.state = SessionState::Dropped;
        self.updated_at = Utc::now();
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }
}
