use config::Config;
use domain::*;
use infrastructure::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use infrastructure::ServedFile;

/// Gateway application - wires the engine client, session registry and
/// file server together behind the operations the HTTP layer exposes.
pub struct GatewayApp {
    sessions: Arc<SessionService>,
    files: LocalFileServer,
    metadata_timeout: Duration,
    add_grace_period: Duration,
    stream_chunk_size: usize,
    drop_on_shutdown: bool,
}

impl GatewayApp {
    /// Builds the application against the qBittorrent daemon named in `config`.
    pub fn new(config: &Config) -> Result<Self, DomainError> {
        let engine = QbittorrentClient::new(QbittorrentSettings {
            base_url: config.qbit_url.clone(),
            username: config.qbit_user.clone(),
            password: config.qbit_pass.clone(),
            save_path: config.qbit_save_path.clone(),
            login_timeout: config.engine_login_timeout(),
            request_timeout: config.engine_request_timeout(),
        })?;

        Ok(Self::with_engine(Arc::new(engine), config))
    }

    pub fn with_engine(engine: Arc<dyn TorrentEngine>, config: &Config) -> Self {
        let engine_client = Arc::new(EngineClient::new(
            engine,
            config.fallback_trackers.clone(),
            config.metadata_poll_interval(),
        ));
        let repository: Arc<dyn SessionRepository> = Arc::new(InMemorySessionRepository::new());
        let readiness = ReadinessPolicy {
            progress_threshold: config.ready_progress_threshold,
            active_states: config.ready_states.clone(),
        };

        Self {
            sessions: Arc::new(SessionService::new(
                engine_client,
                repository,
                readiness,
                config.delete_files_on_drop,
            )),
            files: LocalFileServer::new(&config.download_dir),
            metadata_timeout: config.metadata_timeout(),
            add_grace_period: config.add_grace_period(),
            stream_chunk_size: config.stream_chunk_size(),
            drop_on_shutdown: config.drop_on_shutdown,
        }
    }

    pub async fn connect(&self) -> Result<(), DomainError> {
        self.sessions.engine().connect().await
    }

    /// Adds the magnet and starts a background metadata wait. The call
    /// returns once metadata is in or the grace period is over, whichever
    /// comes first; the wait itself carries on up to the metadata timeout.
    pub async fn add_magnet(&self, magnet: &str) -> Result<SessionHandle, DomainError> {
        let handle = self.sessions.add_magnet(magnet).await?;

        let sessions = self.sessions.clone();
        let info_hash = handle.info_hash.clone();
        let timeout = self.metadata_timeout;
        let mut waiter = tokio::spawn(async move {
            let outcome = sessions.wait_for_metadata(&info_hash, timeout).await;
            if let MetadataWait::Ready(files) = &outcome {
                info!("📋 Metadata for {} ready ({} files)", info_hash, files.len());
            }
            outcome
        });

        match tokio::time::timeout(self.add_grace_period, &mut waiter).await {
            Ok(Ok(outcome)) => debug!(
                "metadata wait for {} finished within grace period (ready: {})",
                handle.info_hash,
                outcome.is_ready()
            ),
            Ok(Err(e)) => warn!("metadata wait for {} aborted: {}", handle.info_hash, e),
            Err(_) => debug!("metadata for {} still pending, responding now", handle.info_hash),
        }

        Ok(handle)
    }

    pub async fn session_status(&self, info_hash: &InfoHash) -> Result<SessionStatus, DomainError> {
        self.sessions.status(info_hash).await
    }

    pub async fn diagnostics(&self, info_hash: &InfoHash) -> Result<SessionDiagnostics, DomainError> {
        self.sessions.diagnostics(info_hash).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<TorrentSession>, DomainError> {
        self.sessions.list().await
    }

    /// Resolves the file by index from a fresh manifest and opens the
    /// requested span on disk.
    pub async fn open_stream(&self, request: &StreamRequest) -> Result<ServedFile, DomainError> {
        let entry = self
            .sessions
            .resolve_file(&request.info_hash, request.file_index)
            .await?;
        debug!(
            "🎬 Streaming {} #{} ({}) range {:?}",
            request.info_hash, request.file_index, entry.path, request.range
        );
        self.files
            .open(&entry.path, request.range.as_ref(), entry.written_bytes())
            .await
    }

    pub async fn drop_session(&self, info_hash: &InfoHash) -> Result<TorrentSession, DomainError> {
        self.sessions.drop_session(info_hash).await
    }

    pub async fn drop_all(&self) -> Result<DropReport, DomainError> {
        self.sessions.drop_all().await
    }

    pub fn stream_chunk_size(&self) -> usize {
        self.stream_chunk_size
    }

    /// Drops every session if the gateway is configured to clean up on exit.
    pub async fn shutdown(&self) {
        if !self.drop_on_shutdown {
            return;
        }
        match self.drop_all().await {
            Ok(report) if report.failed.is_empty() => info!("👋 Dropped all sessions on shutdown"),
            Ok(report) => warn!("👋 {} sessions could not be dropped on shutdown", report.failed.len()),
            Err(e) => warn!("drop on shutdown failed: {}", e),
        }
    }
}
