use crate::entities::{EngineStatus, FileEntry, InfoHash, MagnetLink};
use crate::errors::DomainError;
use crate::services::torrent_engine::TorrentEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of adding a magnet. The engine is not waited on for metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub magnet: String,
}

/// One look at the engine while waiting for metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataProbe {
    Ready(Vec<FileEntry>),
    NotYet,
}

/// Outcome of a bounded metadata wait. Timing out is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataWait {
    Ready(Vec<FileEntry>),
    TimedOut,
}

impl MetadataWait {
    pub fn is_ready(&self) -> bool {
        matches!(self, MetadataWait::Ready(_))
    }
}

/// Validates input and drives a [`TorrentEngine`]. The fallback tracker list
/// is fixed at construction.
pub struct EngineClient {
    engine: Arc<dyn TorrentEngine>,
    fallback_trackers: Vec<String>,
    poll_interval: Duration,
}

impl EngineClient {
    pub fn new(
        engine: Arc<dyn TorrentEngine>,
        fallback_trackers: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            fallback_trackers,
            poll_interval,
        }
    }

    pub async fn connect(&self) -> Result<(), DomainError> {
        self.engine.connect().await
    }

    /// Parses the magnet before anything goes over the wire, injects the
    /// fallback trackers and hands the result to the engine.
    pub async fn add_magnet(&self, magnet: &str) -> Result<SessionHandle, DomainError> {
        let link = MagnetLink::parse(magnet)?;
        let normalized = link.with_fallback_trackers(&self.fallback_trackers);

        self.engine.submit_magnet(&normalized).await?;
        info!(
            "📥 Added magnet {} ({} trackers)",
            link.info_hash,
            self.fallback_trackers.len() + link.trackers.len()
        );

        Ok(SessionHandle {
            info_hash: link.info_hash,
            display_name: link.display_name,
            magnet: normalized,
        })
    }

    pub async fn get_status(&self, info_hash: &InfoHash) -> Result<EngineStatus, DomainError> {
        self.engine.torrent_status(info_hash).await
    }

    pub async fn list_files(&self, info_hash: &InfoHash) -> Result<Vec<FileEntry>, DomainError> {
        self.engine.torrent_files(info_hash).await
    }

    pub async fn remove(&self, info_hash: &InfoHash, delete_files: bool) -> Result<(), DomainError> {
        self.engine.remove_torrent(info_hash, delete_files).await
    }

    /// Errors count as "not yet": right after an add the daemon may not
    /// list the torrent at all.
    pub async fn probe_metadata(&self, info_hash: &InfoHash) -> MetadataProbe {
        match self.engine.torrent_files(info_hash).await {
            Ok(files) if !files.is_empty() => MetadataProbe::Ready(files),
            Ok(_) => MetadataProbe::NotYet,
            Err(e) => {
                debug!("metadata probe for {} failed: {}", info_hash, e);
                MetadataProbe::NotYet
            }
        }
    }

    /// Polls at the fixed interval until the file list appears or `timeout`
    /// elapses.
    pub async fn wait_for_metadata(&self, info_hash: &InfoHash, timeout: Duration) -> MetadataWait {
        let poll = async {
            loop {
                if let MetadataProbe::Ready(files) = self.probe_metadata(info_hash).await {
                    return files;
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(files) => {
                debug!("metadata for {} ready with {} files", info_hash, files.len());
                MetadataWait::Ready(files)
            }
            Err(_) => {
                warn!("⏳ Timed out after {:?} waiting for metadata of {}", timeout, info_hash);
                MetadataWait::TimedOut
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedEngine;
    use super::*;

    const HASH: &str = "c9e15763f722f23e98a29decdfae341b98d53056";

    fn client(engine: Arc<ScriptedEngine>) -> EngineClient {
        EngineClient::new(
            engine,
            vec!["udp://tracker.example:1337/announce".to_string()],
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn add_returns_hash_and_submits_normalized_magnet() {
        let engine = Arc::new(ScriptedEngine::default());
        let client = client(engine.clone());

        let handle = client
            .add_magnet(&format!("magnet:?xt=urn:btih:{}&dn=Sintel", HASH.to_uppercase()))
            .await
            .unwrap();

        assert_eq!(handle.info_hash.as_str(), HASH);
        assert_eq!(handle.display_name.as_deref(), Some("Sintel"));
        let submitted = engine.submitted.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].starts_with(&format!("magnet:?xt=urn:btih:{}&dn=Sintel&tr=udp", HASH)));
    }

    #[tokio::test]
    async fn invalid_magnet_never_reaches_the_engine() {
        let engine = Arc::new(ScriptedEngine::default());
        let client = client(engine.clone());

        for bad in ["magnet:?dn=nohash", "magnet:?xt=urn:btih:1234", "https://x.y/z"] {
            let err = client.add_magnet(bad).await.unwrap_err();
            assert_eq!(err.code(), "invalid_magnet");
        }
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn list_files_is_empty_before_metadata() {
        let hash = InfoHash::parse(HASH).unwrap();
        let engine = Arc::new(ScriptedEngine::default().with_torrent(
            &hash,
            EngineStatus::new("metaDL", 0.0),
            Vec::new(),
        ));
        let client = client(engine);

        assert!(client.list_files(&hash).await.unwrap().is_empty());
        assert_eq!(client.probe_metadata(&hash).await, MetadataProbe::NotYet);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_metadata_polls_until_files_appear() {
        let hash = InfoHash::parse(HASH).unwrap();
        let engine = ScriptedEngine::default().with_torrent(
            &hash,
            EngineStatus::new("downloading", 0.0),
            vec![FileEntry::new(0, "movie.mkv", 42)],
        );
        engine.files_after_listings.store(3, std::sync::atomic::Ordering::SeqCst);
        let client = client(Arc::new(engine));

        let started = tokio::time::Instant::now();
        let outcome = client.wait_for_metadata(&hash, Duration::from_secs(20)).await;

        assert_eq!(outcome, MetadataWait::Ready(vec![FileEntry::new(0, "movie.mkv", 42)]));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_metadata_times_out_without_error() {
        let hash = InfoHash::parse(HASH).unwrap();
        let client = client(Arc::new(ScriptedEngine::default()));

        let started = tokio::time::Instant::now();
        let outcome = client.wait_for_metadata(&hash, Duration::from_secs(5)).await;

        assert_eq!(outcome, MetadataWait::TimedOut);
        assert!(!outcome.is_ready());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }
}
