use crate::entities::{EngineStatus, FileEntry, InfoHash};
use crate::errors::DomainError;
use async_trait::async_trait;

/// Control plane of the BitTorrent daemon that does the actual downloading.
///
/// Implementations own the wire protocol and the mapping of whatever the
/// daemon returns into [`EngineStatus`] and [`FileEntry`]; nothing above this
/// trait sees daemon-specific shapes.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Establishes (or refreshes) the daemon session.
    async fn connect(&self) -> Result<(), DomainError>;

    /// Submits an already validated and normalized magnet link.
    async fn submit_magnet(&self, magnet: &str) -> Result<(), DomainError>;

    /// Fails with `NotFound` when the daemon has no record of the hash.
    async fn torrent_status(&self, info_hash: &InfoHash) -> Result<EngineStatus, DomainError>;

    /// Empty until metadata has arrived. Order and indices are the daemon's.
    async fn torrent_files(&self, info_hash: &InfoHash) -> Result<Vec<FileEntry>, DomainError>;

    async fn remove_torrent(&self, info_hash: &InfoHash, delete_files: bool) -> Result<(), DomainError>;
}
