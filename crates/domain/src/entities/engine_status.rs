use serde::{Deserialize, Serialize};

/// Engine states that mean the torrent is broken rather than slow.
const ERROR_STATES: &[&str] = &["error", "missingFiles"];

/// Metadata-fetching state reported while a magnet has no file list yet.
const METADATA_STATE: &str = "metaDL";

/// Last snapshot of a torrent as reported by the engine daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: String,
    pub progress: f64,
    pub total_size: Option<u64>,
    pub name: Option<String>,
}

impl EngineStatus {
    pub fn new(state: impl Into<String>, progress: f64) -> Self {
        Self {
            state: state.into(),
            progress: progress.clamp(0.0, 1.0),
            total_size: None,
            name: None,
        }
    }

    pub fn is_errored(&self) -> bool {
        ERROR_STATES.contains(&self.state.as_str())
    }

    pub fn is_fetching_metadata(&self) -> bool {
        self.state == METADATA_STATE
    }
}
