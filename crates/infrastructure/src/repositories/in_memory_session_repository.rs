use async_trait::async_trait;
use domain::{DomainError, InfoHash, SessionRepository, TorrentSession};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local session registry. Sessions do not survive a restart; the
/// daemon remains the source of truth for what is actually downloading.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<InfoHash, TorrentSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<InfoHash, TorrentSession>>, DomainError> {
        self.sessions
            .lock()
            .map_err(|_| DomainError::Io("session registry lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn register(&self, session: TorrentSession) -> Result<TorrentSession, DomainError> {
        let mut sessions = self.lock()?;
        let stored = sessions
            .entry(session.info_hash.clone())
            .or_insert(session);
        Ok(stored.clone())
    }

    async fn find_by_hash(&self, info_hash: &InfoHash) -> Result<Option<TorrentSession>, DomainError> {
        Ok(self.lock()?.get(info_hash).cloned())
    }

    async fn save(&self, session: &TorrentSession) -> Result<(), DomainError> {
        self.lock()?
            .insert(session.info_hash.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, info_hash: &InfoHash) -> Result<Option<TorrentSession>, DomainError> {
        Ok(self.lock()?.remove(info_hash))
    }

    async fn find_all(&self) -> Result<Vec<TorrentSession>, DomainError> {
        let mut sessions: Vec<TorrentSession> = self.lock()?.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.info_hash.cmp(&b.info_hash)));
        Ok(sessions)
    }
}
