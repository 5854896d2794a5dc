pub mod manifest;
pub mod qbittorrent;

pub use manifest::{map_file_manifest, map_torrent_status};
pub use qbittorrent::{QbittorrentClient, QbittorrentSettings};
