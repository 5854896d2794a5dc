pub mod engine_client;
pub mod file_resolver;
pub mod session_service;
pub mod torrent_engine;

pub use engine_client::{EngineClient, MetadataProbe, MetadataWait, SessionHandle};
pub use file_resolver::resolve_main_file;
pub use session_service::{
    DropReport, MainFileSummary, ReadinessPolicy, SessionDiagnostics, SessionService, SessionStatus,
};
pub use torrent_engine::TorrentEngine;
