//! Translation of daemon payloads into domain types.
//!
//! Daemon versions disagree on field names and nesting for the same data
//! (`name` vs `path`, `size` vs `length`, bare arrays vs `file_stats`).
//! Every such difference is absorbed here.

use domain::{EngineStatus, FileEntry};
use serde_json::Value;

const FILE_LIST_KEYS: &[&str] = &["file_stats", "Files", "files"];
const PATH_KEYS: &[&str] = &["name", "path", "Path"];
const LENGTH_KEYS: &[&str] = &["size", "length", "Length"];
const INDEX_KEYS: &[&str] = &["index", "id"];

/// Maps a file manifest to canonical entries, keeping the daemon's order.
/// Entries carry the daemon's own index when it sends one, else their
/// position. Unusable entries are skipped.
pub fn map_file_manifest(payload: &Value) -> Vec<FileEntry> {
    manifest_entries(payload)
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| map_file_entry(position, entry))
        .collect()
}

/// Maps a torrent info payload (an object, or the first element of an
/// array) to a status snapshot. `None` when the payload holds no torrent.
pub fn map_torrent_status(payload: &Value) -> Option<EngineStatus> {
    let info = match payload {
        Value::Array(items) => items.first()?,
        Value::Object(_) => payload,
        _ => return None,
    };

    let state = first_str(info, &["state", "stat_string"]).unwrap_or("unknown");
    let progress = info.get("progress").and_then(Value::as_f64).unwrap_or(0.0);

    let mut status = EngineStatus::new(state, progress);
    status.total_size = first_u64(info, &["size", "total_size", "torrent_size"]);
    status.name = first_str(info, &["name", "title"]).map(str::to_string);
    Some(status)
}

fn manifest_entries(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items,
        Value::Object(map) => FILE_LIST_KEYS
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_array))
            .find(|items| !items.is_empty())
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn map_file_entry(position: usize, entry: &Value) -> Option<FileEntry> {
    let path = first_str(entry, PATH_KEYS)?;
    let length = first_u64(entry, LENGTH_KEYS)?;
    let index = first_u64(entry, INDEX_KEYS)
        .and_then(|i| usize::try_from(i).ok())
        .unwrap_or(position);

    let file = FileEntry::new(index, path, length);
    Some(match entry.get("progress").and_then(Value::as_f64) {
        Some(progress) => file.with_progress(progress),
        None => file,
    })
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_str))
}

fn first_u64(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| {
        let field = value.get(*key)?;
        field
            .as_u64()
            .or_else(|| field.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    })
}
