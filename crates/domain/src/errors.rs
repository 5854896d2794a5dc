use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid magnet link: {0}")]
    InvalidMagnet(String),

    #[error("Invalid info hash: {0}")]
    InvalidInfoHash(String),

    #[error("Torrent engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Torrent engine rejected the request: {0}")]
    EngineRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File not found (or not allocated yet): {0}")]
    NotYetAllocated(String),

    #[error("Requested range not satisfiable for file of {size} bytes")]
    RangeUnsatisfiable { size: u64 },

    #[error("Path escapes the download root: {0}")]
    PathTraversal(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl DomainError {
    /// Stable identifier clients can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidMagnet(_) => "invalid_magnet",
            DomainError::InvalidInfoHash(_) => "invalid_info_hash",
            DomainError::EngineUnavailable(_) => "engine_unavailable",
            DomainError::EngineRejected(_) => "engine_rejected",
            DomainError::NotFound(_) => "not_found",
            DomainError::NotYetAllocated(_) => "not_allocated",
            DomainError::RangeUnsatisfiable { .. } => "range_unsatisfiable",
            DomainError::PathTraversal(_) => "path_traversal",
            DomainError::Io(_) => "io_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}
