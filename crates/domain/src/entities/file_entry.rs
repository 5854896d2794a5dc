use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions treated as directly playable video.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "ts", "m2ts", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ogv", "mpg",
    "mpeg",
];

/// One file inside a torrent, addressed by the engine's own index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub index: usize,
    pub path: String,
    pub length: u64,
    pub progress: Option<f64>,
}

impl FileEntry {
    pub fn new(index: usize, path: impl Into<String>, length: u64) -> Self {
        Self {
            index,
            path: path.into(),
            length,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress.clamp(0.0, 1.0));
        self
    }

    /// Bytes from offset 0 known to be written, given sequential download.
    /// `None` when the engine does not report per-file progress.
    pub fn written_bytes(&self) -> Option<u64> {
        self.progress
            .map(|progress| ((progress * self.length as f64).floor() as u64).min(self.length))
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(self.file_name())
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
    }

    pub fn is_video(&self) -> bool {
        self.extension()
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.path)
    }
}

/// Content type served for a path. Unknown extensions are served as mp4,
/// which is what most players expect from a progressive stream.
pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        "ts" | "m2ts" => "video/mp2t",
        "3gp" => "video/3gpp",
        "ogv" => "video/ogg",
        "mpg" | "mpeg" => "video/mpeg",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "srt" => "application/x-subrip",
        "vtt" => "text/vtt",
        _ => "video/mp4",
    }
}
