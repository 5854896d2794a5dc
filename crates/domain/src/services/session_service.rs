use crate::entities::{EngineStatus, FileEntry, InfoHash, SessionState, TorrentSession};
use crate::errors::DomainError;
use crate::repositories::SessionRepository;
use crate::services::engine_client::{EngineClient, MetadataWait, SessionHandle};
use crate::services::file_resolver::resolve_main_file;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// "Soft ready": some engines report 0% for a while even though the file is
/// already streamable, so an active download state counts as ready too.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessPolicy {
    pub progress_threshold: f64,
    pub active_states: Vec<String>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            progress_threshold: 0.05,
            active_states: vec!["downloading".to_string(), "stalledDL".to_string()],
        }
    }
}

impl ReadinessPolicy {
    pub fn is_ready(&self, status: &EngineStatus) -> bool {
        status.progress > self.progress_threshold
            || self.active_states.iter().any(|s| s == &status.state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MainFileSummary {
    pub index: usize,
    pub name: String,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub hash: InfoHash,
    pub state: String,
    pub progress: f64,
    pub ready: bool,
    pub lifecycle: SessionState,
    pub file: Option<MainFileSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDiagnostics {
    pub hash: InfoHash,
    pub is_in_engine: bool,
    pub is_registered: bool,
    pub state: String,
    pub progress: f64,
    pub files_count: usize,
    pub first_file: Option<String>,
    pub total_size: u64,
    pub has_metadata: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DropReport {
    pub dropped: Vec<InfoHash>,
    pub failed: Vec<InfoHash>,
}

/// Session lifecycle on top of the engine client and the registry.
pub struct SessionService {
    engine: Arc<EngineClient>,
    repository: Arc<dyn SessionRepository>,
    readiness: ReadinessPolicy,
    delete_files_on_drop: bool,
}

impl SessionService {
    pub fn new(
        engine: Arc<EngineClient>,
        repository: Arc<dyn SessionRepository>,
        readiness: ReadinessPolicy,
        delete_files_on_drop: bool,
    ) -> Self {
        Self {
            engine,
            repository,
            readiness,
            delete_files_on_drop,
        }
    }

    pub fn engine(&self) -> &EngineClient {
        &self.engine
    }

    pub async fn add_magnet(&self, magnet: &str) -> Result<SessionHandle, DomainError> {
        let handle = self.engine.add_magnet(magnet).await?;
        self.repository
            .register(TorrentSession::new(
                handle.info_hash.clone(),
                handle.display_name.clone(),
            ))
            .await?;
        Ok(handle)
    }

    pub async fn get(&self, info_hash: &InfoHash) -> Result<TorrentSession, DomainError> {
        self.repository
            .find_by_hash(info_hash)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("session {} not registered", info_hash)))
    }

    pub async fn list(&self) -> Result<Vec<TorrentSession>, DomainError> {
        self.repository.find_all().await
    }

    /// Current engine view of a session. A hash the engine does not know is
    /// `NotFound` and is forgotten by the registry as well.
    pub async fn status(&self, info_hash: &InfoHash) -> Result<SessionStatus, DomainError> {
        let status = match self.engine.get_status(info_hash).await {
            Ok(status) => status,
            Err(e) if e.is_not_found() => {
                if self.repository.delete(info_hash).await?.is_some() {
                    info!("🗑️ Session {} is gone from the engine", info_hash);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let files = self.engine.list_files(info_hash).await?;
        let session = self.record(info_hash, &status, files).await?;

        let file = resolve_main_file(&session.files).map(|f| MainFileSummary {
            index: f.index,
            name: f.path.clone(),
            progress: f.progress.unwrap_or(0.0),
        });

        Ok(SessionStatus {
            hash: info_hash.clone(),
            ready: self.readiness.is_ready(&status),
            state: status.state,
            progress: status.progress,
            lifecycle: session.state,
            file,
        })
    }

    /// Everything known about a hash; never fails on an unknown one.
    pub async fn diagnostics(&self, info_hash: &InfoHash) -> Result<SessionDiagnostics, DomainError> {
        let status = match self.engine.get_status(info_hash).await {
            Ok(status) => Some(status),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let files = match &status {
            Some(_) => match self.engine.list_files(info_hash).await {
                Ok(files) => files,
                Err(e) => {
                    debug!("file listing for {} failed during diagnostics: {}", info_hash, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let is_registered = self.repository.find_by_hash(info_hash).await?.is_some();

        let has_metadata = !files.is_empty()
            && status.as_ref().is_some_and(|s| !s.is_fetching_metadata());
        Ok(SessionDiagnostics {
            hash: info_hash.clone(),
            is_in_engine: status.is_some(),
            is_registered,
            state: status.as_ref().map_or_else(|| "not_found".to_string(), |s| s.state.clone()),
            progress: status.as_ref().map_or(0.0, |s| s.progress),
            files_count: files.len(),
            first_file: files.first().map(|f| f.path.clone()),
            total_size: status
                .as_ref()
                .and_then(|s| s.total_size)
                .unwrap_or_else(|| files.iter().map(|f| f.length).sum()),
            has_metadata,
        })
    }

    /// Bounded wait for the file list; a ready result is recorded in the
    /// registry.
    pub async fn wait_for_metadata(&self, info_hash: &InfoHash, timeout: Duration) -> MetadataWait {
        let outcome = self.engine.wait_for_metadata(info_hash, timeout).await;
        if let MetadataWait::Ready(files) = &outcome {
            if let Err(e) = self.record_files(info_hash, files.clone()).await {
                warn!("could not record metadata for {}: {}", info_hash, e);
            }
        }
        outcome
    }

    /// Looks up a file by the engine's index. The listing is fetched fresh
    /// because it can be shorter than expected while metadata is partial.
    pub async fn resolve_file(&self, info_hash: &InfoHash, index: usize) -> Result<FileEntry, DomainError> {
        let files = self.engine.list_files(info_hash).await?;
        let count = files.len();
        let entry = files.iter().find(|f| f.index == index).cloned();
        self.record_files(info_hash, files).await?;

        entry.ok_or_else(|| {
            DomainError::NotFound(format!(
                "file index {} not found in {} ({} files known)",
                index, info_hash, count
            ))
        })
    }

    /// Removes the torrent from the engine and forgets it.
    pub async fn drop_session(&self, info_hash: &InfoHash) -> Result<TorrentSession, DomainError> {
        let in_engine = match self.engine.remove(info_hash, self.delete_files_on_drop).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };
        let registered = self.repository.delete(info_hash).await?;

        if !in_engine && registered.is_none() {
            return Err(DomainError::NotFound(format!("session {} not found", info_hash)));
        }

        let mut session =
            registered.unwrap_or_else(|| TorrentSession::new(info_hash.clone(), None));
        session.mark_dropped();
        info!("🧹 Dropped session {}", info_hash);
        Ok(session)
    }

    /// Drops every registered session. Failures are reported, not raised,
    /// and the failed sessions stay registered.
    pub async fn drop_all(&self) -> Result<DropReport, DomainError> {
        let mut report = DropReport::default();
        for session in self.repository.find_all().await? {
            let hash = session.info_hash;
            match self.drop_session(&hash).await {
                Ok(_) => report.dropped.push(hash),
                Err(e) if e.is_not_found() => report.dropped.push(hash),
                Err(e) => {
                    warn!("failed to drop session {}: {}", hash, e);
                    report.failed.push(hash);
                }
            }
        }
        info!(
            "🧹 Dropped {} sessions ({} failed)",
            report.dropped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn record(
        &self,
        info_hash: &InfoHash,
        status: &EngineStatus,
        files: Vec<FileEntry>,
    ) -> Result<TorrentSession, DomainError> {
        // Only sessions added through this gateway are registered; anything
        // else the daemon knows is described but never stored.
        match self.repository.find_by_hash(info_hash).await? {
            Some(mut session) => {
                session.observe(status, files);
                self.repository.save(&session).await?;
                Ok(session)
            }
            None => {
                let mut session = TorrentSession::new(info_hash.clone(), None);
                session.observe(status, files);
                Ok(session)
            }
        }
    }

    async fn record_files(&self, info_hash: &InfoHash, files: Vec<FileEntry>) -> Result<(), DomainError> {
        if let Some(mut session) = self.repository.find_by_hash(info_hash).await? {
            session.record_files(files);
            self.repository.save(&session).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine_client::test_support::ScriptedEngine;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const HASH: &str = "c9e15763f722f23e98a29decdfae341b98d53056";

    #[derive(Default)]
    struct MapRepository(Mutex<HashMap<InfoHash, TorrentSession>>);

    #[async_trait]
    impl SessionRepository for MapRepository {
        async fn register(&self, session: TorrentSession) -> Result<TorrentSession, DomainError> {
            let mut map = self.0.lock().unwrap();
            Ok(map.entry(session.info_hash.clone()).or_insert(session).clone())
        }

        async fn find_by_hash(&self, info_hash: &InfoHash) -> Result<Option<TorrentSession>, DomainError> {
            Ok(self.0.lock().unwrap().get(info_hash).cloned())
        }

        async fn save(&self, session: &TorrentSession) -> Result<(), DomainError> {
            self.0.lock().unwrap().insert(session.info_hash.clone(), session.clone());
            Ok(())
        }

        async fn delete(&self, info_hash: &InfoHash) -> Result<Option<TorrentSession>, DomainError> {
            Ok(self.0.lock().unwrap().remove(info_hash))
        }

        async fn find_all(&self) -> Result<Vec<TorrentSession>, DomainError> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }
    }

    fn hash() -> InfoHash {
        InfoHash::parse(HASH).unwrap()
    }

    fn service(engine: Arc<ScriptedEngine>) -> SessionService {
        let client = EngineClient::new(engine, Vec::new(), Duration::from_secs(1));
        SessionService::new(
            Arc::new(client),
            Arc::new(MapRepository::default()),
            ReadinessPolicy::default(),
            true,
        )
    }

    #[test]
    fn readiness_uses_threshold_or_active_state() {
        let policy = ReadinessPolicy::default();
        assert!(!policy.is_ready(&EngineStatus::new("metaDL", 0.0)));
        assert!(!policy.is_ready(&EngineStatus::new("pausedDL", 0.05)));
        assert!(policy.is_ready(&EngineStatus::new("pausedDL", 0.06)));
        assert!(policy.is_ready(&EngineStatus::new("downloading", 0.0)));
        assert!(policy.is_ready(&EngineStatus::new("stalledDL", 0.0)));

        let strict = ReadinessPolicy {
            progress_threshold: 0.5,
            active_states: Vec::new(),
        };
        assert!(!strict.is_ready(&EngineStatus::new("downloading", 0.2)));
    }

    #[tokio::test]
    async fn add_registers_session() {
        let service = service(Arc::new(ScriptedEngine::default()));
        let handle = service
            .add_magnet(&format!("magnet:?xt=urn:btih:{}", HASH))
            .await
            .unwrap();

        let session = service.get(&handle.info_hash).await.unwrap();
        assert_eq!(session.state, SessionState::Added);
    }

    #[tokio::test]
    async fn status_of_unknown_hash_is_not_found() {
        let service = service(Arc::new(ScriptedEngine::default()));
        let err = service.status(&hash()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn status_reports_main_file_and_soft_ready() {
        let files = vec![
            FileEntry::new(0, "Movie/sample.mkv", 10).with_progress(1.0),
            FileEntry::new(1, "Movie/movie.mkv", 1000).with_progress(0.1),
            FileEntry::new(2, "Movie/info.nfo", 1),
        ];
        let engine = ScriptedEngine::default().with_torrent(
            &hash(),
            EngineStatus::new("downloading", 0.01),
            files,
        );
        let service = service(Arc::new(engine));

        let status = service.status(&hash()).await.unwrap();
        assert!(status.ready);
        assert_eq!(status.lifecycle, SessionState::Ready);
        assert_eq!(
            status.file,
            Some(MainFileSummary {
                index: 1,
                name: "Movie/movie.mkv".to_string(),
                progress: 0.1,
            })
        );
        assert!(service.get(&hash()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn status_before_metadata_has_no_file() {
        let engine =
            ScriptedEngine::default().with_torrent(&hash(), EngineStatus::new("metaDL", 0.0), Vec::new());
        let service = service(Arc::new(engine));

        let status = service.status(&hash()).await.unwrap();
        assert!(!status.ready);
        assert_eq!(status.lifecycle, SessionState::MetadataPending);
        assert_eq!(status.file, None);
    }

    #[tokio::test]
    async fn resolve_file_checks_bounds() {
        let engine = ScriptedEngine::default().with_torrent(
            &hash(),
            EngineStatus::new("downloading", 0.5),
            vec![FileEntry::new(0, "a.mp4", 5), FileEntry::new(1, "b.mp4", 6)],
        );
        let service = service(Arc::new(engine));

        assert_eq!(service.resolve_file(&hash(), 1).await.unwrap().path, "b.mp4");
        assert!(service.resolve_file(&hash(), 2).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn drop_all_removes_registered_sessions() {
        let other = InfoHash::parse(&"b".repeat(40)).unwrap();
        let engine = Arc::new(ScriptedEngine::default());
        let service = service(engine.clone());
        service.add_magnet(&format!("magnet:?xt=urn:btih:{}", HASH)).await.unwrap();
        service.add_magnet(&format!("magnet:?xt=urn:btih:{}", other)).await.unwrap();
        *engine.fail_removal_of.lock().unwrap() = Some(other.clone());

        let report = service.drop_all().await.unwrap();

        assert_eq!(report.dropped, vec![hash()]);
        assert_eq!(report.failed, vec![other.clone()]);
        assert!(service.get(&hash()).await.is_err());
        assert!(service.get(&other).await.is_ok());
        assert_eq!(engine.removed.lock().unwrap().clone(), vec![hash()]);
    }

    #[tokio::test]
    async fn drop_all_leaves_torrents_added_elsewhere() {
        let foreign = InfoHash::parse(&"e".repeat(40)).unwrap();
        let engine = Arc::new(ScriptedEngine::default().with_torrent(
            &foreign,
            EngineStatus::new("uploading", 1.0),
            vec![FileEntry::new(0, "Other/other.mkv", 10)],
        ));
        let service = service(engine.clone());
        service.add_magnet(&format!("magnet:?xt=urn:btih:{}", HASH)).await.unwrap();

        let status = service.status(&foreign).await.unwrap();
        assert_eq!(status.lifecycle, SessionState::Ready);
        let report = service.drop_all().await.unwrap();

        assert_eq!(report.dropped, vec![hash()]);
        assert_eq!(engine.removed.lock().unwrap().clone(), vec![hash()]);
        assert!(engine.statuses.lock().unwrap().contains_key(&foreign));
    }

    #[tokio::test]
    async fn status_updates_registered_sessions() {
        let engine = Arc::new(ScriptedEngine::default());
        let service = service(engine.clone());
        service.add_magnet(&format!("magnet:?xt=urn:btih:{}", HASH)).await.unwrap();
        engine
            .files
            .lock()
            .unwrap()
            .insert(hash(), vec![FileEntry::new(0, "movie.mp4", 10)]);

        service.status(&hash()).await.unwrap();

        let session = service.get(&hash()).await.unwrap();
        assert_eq!(session.state, SessionState::Ready);
        assert_eq!(session.files.len(), 1);
    }

    #[tokio::test]
    async fn dropping_an_unknown_session_is_not_found() {
        let service = service(Arc::new(ScriptedEngine::default()));
        assert!(service.drop_session(&hash()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn diagnostics_never_fail_on_unknown_hash() {
        let service = service(Arc::new(ScriptedEngine::default()));
        let diagnostics = service.diagnostics(&hash()).await.unwrap();
        assert!(!diagnostics.is_in_engine);
        assert_eq!(diagnostics.state, "not_found");
        assert!(!diagnostics.has_metadata);
    }

    #[tokio::test]
    async fn diagnostics_survive_a_failed_file_listing() {
        let engine = ScriptedEngine::default().with_torrent(
            &hash(),
            EngineStatus::new("downloading", 0.3),
            vec![FileEntry::new(0, "movie.mp4", 10)],
        );
        engine.fail_listings.store(true, std::sync::atomic::Ordering::SeqCst);
        let service = service(Arc::new(engine));

        let diagnostics = service.diagnostics(&hash()).await.unwrap();

        assert!(diagnostics.is_in_engine);
        assert_eq!(diagnostics.state, "downloading");
        assert_eq!(diagnostics.files_count, 0);
        assert!(!diagnostics.has_metadata);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_metadata_records_files() {
        let engine = Arc::new(ScriptedEngine::default());
        let service = service(engine.clone());
        service.add_magnet(&format!("magnet:?xt=urn:btih:{}", HASH)).await.unwrap();
        engine
            .files
            .lock()
            .unwrap()
            .insert(hash(), vec![FileEntry::new(0, "movie.mp4", 10)]);
        engine.files_after_listings.store(2, std::sync::atomic::Ordering::SeqCst);

        let outcome = service.wait_for_metadata(&hash(), Duration::from_secs(20)).await;

        assert!(outcome.is_ready());
        assert!(service.get(&hash()).await.unwrap().is_ready());
    }
}
