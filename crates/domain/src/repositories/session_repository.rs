use crate::entities::{InfoHash, TorrentSession};
use crate::errors::DomainError;
use async_trait::async_trait;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts the session unless one is already registered for its hash;
    /// returns whichever session is stored afterwards.
    async fn register(&self, session: TorrentSession) -> Result<TorrentSession, DomainError>;
    async fn find_by_hash(&self, info_hash: &InfoHash) -> Result<Option<TorrentSession>, DomainError>;
    async fn save(&self, session: &TorrentSession) -> Result<(), DomainError>;
    async fn delete(&self, info_hash: &InfoHash) -> Result<Option<TorrentSession>, DomainError>;
    async fn find_all(&self) -> Result<Vec<TorrentSession>, DomainError>;
}
