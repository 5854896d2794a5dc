use bytes::Bytes;
use domain::{content_type_for, ByteRange, DomainError, RangeRequest};
use futures::stream::{self, Stream};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::warn;

/// Serves files out of the shared download directory.
///
/// Paths come from the engine's manifest and are joined under `root` only
/// after a lexical check, so nothing outside the root is ever touched.
#[derive(Debug, Clone)]
pub struct LocalFileServer {
    root: PathBuf,
}

/// An opened file positioned at the start of the requested span.
#[derive(Debug)]
pub struct ServedFile {
    file: File,
    pub range: Option<ByteRange>,
    pub total_size: u64,
    pub content_type: &'static str,
}

impl LocalFileServer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins a manifest path under the root. Absolute paths and `..`
    /// segments are rejected without consulting the filesystem.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, DomainError> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    warn!(target: "security", path = relative, "rejected path outside download root");
                    return Err(DomainError::PathTraversal(relative.to_string()));
                }
            }
        }

        if depth == 0 {
            return Err(DomainError::NotFound(format!("empty file path '{}'", relative)));
        }
        Ok(resolved)
    }

    /// Opens a file for serving. `written` is the length of the prefix the
    /// engine has written so far; preallocated or sparse files can be longer
    /// on disk than that, and nothing past it is served.
    pub async fn open(
        &self,
        relative: &str,
        range: Option<&RangeRequest>,
        written: Option<u64>,
    ) -> Result<ServedFile, DomainError> {
        let path = self.resolve(relative)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("📭 {} not on disk yet", path.display());
                return Err(DomainError::NotYetAllocated(relative.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(DomainError::NotFound(format!("'{}' is not a file", relative)));
        }

        // Symlinks inside the root must not lead out of it.
        let canonical_root = tokio::fs::canonicalize(&self.root).await?;
        let canonical_path = tokio::fs::canonicalize(&path).await?;
        if !canonical_path.starts_with(&canonical_root) {
            warn!(target: "security", path = relative, "rejected link escaping download root");
            return Err(DomainError::PathTraversal(relative.to_string()));
        }

        let total_size = written.map_or(metadata.len(), |written| written.min(metadata.len()));
        let range = range.map(|range| range.resolve(total_size)).transpose()?;

        let mut file = File::open(&canonical_path).await?;
        if let Some(range) = range {
            file.seek(SeekFrom::Start(range.start)).await?;
        }

        Ok(ServedFile {
            file,
            range,
            total_size,
            content_type: content_type_for(relative),
        })
    }
}

impl ServedFile {
    /// Bytes the response will declare: the span length, or the whole file.
    pub fn content_length(&self) -> u64 {
        self.range.map(|range| range.len()).unwrap_or(self.total_size)
    }

    /// Reads the span in chunks of at most `chunk_size` bytes. The stream
    /// ends early if the file turns out shorter than its declared size.
    pub fn into_byte_stream(self, chunk_size: usize) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        let chunk_size = chunk_size.max(1) as u64;
        let remaining = self.content_length();

        stream::unfold((self.file, remaining), move |(mut file, remaining)| async move {
            if remaining == 0 {
                return None;
            }

            let mut buffer = vec![0u8; remaining.min(chunk_size) as usize];
            match file.read(&mut buffer).await {
                Ok(0) => None,
                Ok(read) => {
                    buffer.truncate(read);
                    Some((Ok(Bytes::from(buffer)), (file, remaining - read as u64)))
                }
                Err(e) => Some((Err(e), (file, 0))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    async fn fixture(len: usize) -> (TempDir, LocalFileServer, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        tokio::fs::create_dir_all(dir.path().join("Movie")).await.unwrap();
        tokio::fs::write(dir.path().join("Movie/movie.mp4"), &data).await.unwrap();
        let server = LocalFileServer::new(dir.path());
        (dir, server, data)
    }

    async fn body(file: ServedFile, chunk_size: usize) -> Vec<u8> {
        let chunks: Vec<Bytes> = file.into_byte_stream(chunk_size).try_collect().await.unwrap();
        chunks.concat()
    }

    #[test]
    fn traversal_is_rejected_lexically() {
        let server = LocalFileServer::new("/downloads");
        for path in ["../etc/passwd", "/etc/passwd", "Movie/../../etc/passwd", ".."] {
            let err = server.resolve(path).unwrap_err();
            assert_eq!(err.code(), "path_traversal", "{}", path);
        }
        assert_eq!(
            server.resolve("./Movie/movie.mp4").unwrap(),
            PathBuf::from("/downloads/Movie/movie.mp4")
        );
        assert!(server.resolve("").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn missing_file_is_not_yet_allocated() {
        let (_dir, server, _) = fixture(10).await;
        let err = server.open("Movie/other.mkv", None, None).await.unwrap_err();
        assert_eq!(err.code(), "not_allocated");
    }

    #[tokio::test]
    async fn full_file_is_streamed_in_chunks() {
        let (_dir, server, data) = fixture(10_000).await;
        let file = server.open("Movie/movie.mp4", None, None).await.unwrap();

        assert_eq!(file.range, None);
        assert_eq!(file.content_length(), 10_000);
        assert_eq!(file.content_type, "video/mp4");
        assert_eq!(body(file, 4096).await, data);
    }

    #[tokio::test]
    async fn range_is_served_from_offset() {
        let (_dir, server, data) = fixture(10_000).await;
        let range = RangeRequest::From { start: 100, end: Some(199) };
        let file = server.open("Movie/movie.mp4", Some(&range), None).await.unwrap();

        assert_eq!(file.range, Some(ByteRange { start: 100, end: 199 }));
        assert_eq!(file.content_length(), 100);
        assert_eq!(body(file, 64).await, &data[100..200]);
    }

    #[tokio::test]
    async fn range_past_end_is_clamped_or_rejected() {
        let (_dir, server, data) = fixture(1_000).await;

        let clamped = RangeRequest::From { start: 900, end: Some(5_000) };
        let file = server.open("Movie/movie.mp4", Some(&clamped), None).await.unwrap();
        assert_eq!(file.content_length(), 100);
        assert_eq!(body(file, 4096).await, &data[900..]);

        let beyond = RangeRequest::From { start: 1_000, end: None };
        let err = server.open("Movie/movie.mp4", Some(&beyond), None).await.unwrap_err();
        assert_eq!(err, DomainError::RangeUnsatisfiable { size: 1_000 });
    }

    #[tokio::test]
    async fn suffix_range_serves_the_tail() {
        let (_dir, server, data) = fixture(1_000).await;
        let file = server
            .open("Movie/movie.mp4", Some(&RangeRequest::Suffix(10)), None)
            .await
            .unwrap();
        assert_eq!(body(file, 4096).await, &data[990..]);
    }

    #[tokio::test]
    async fn shrinking_file_ends_the_stream_early() {
        let (dir, server, data) = fixture(1_000).await;
        let file = server.open("Movie/movie.mp4", None, None).await.unwrap();
        tokio::fs::write(dir.path().join("Movie/movie.mp4"), &data[..300]).await.unwrap();

        let served = body(file, 128).await;
        assert!(served.len() <= 1_000);
        assert_eq!(&served[..], &data[..served.len()]);
    }

    #[tokio::test]
    async fn concurrent_ranges_are_independent() {
        let (_dir, server, data) = fixture(64 * 1024).await;
        let spans = [(0u64, 1_023u64), (10_000, 20_000), (60_000, 65_535)];

        let reads = spans.iter().map(|&(start, end)| {
            let server = server.clone();
            tokio::spawn(async move {
                let range = RangeRequest::From { start, end: Some(end) };
                let file = server.open("Movie/movie.mp4", Some(&range), None).await.unwrap();
                body(file, 1000).await
            })
        });
        let results = futures::future::join_all(reads).await;

        for (result, &(start, end)) in results.into_iter().zip(spans.iter()) {
            assert_eq!(result.unwrap(), &data[start as usize..=end as usize]);
        }
    }

    #[tokio::test]
    async fn sparse_file_is_served_only_up_to_written_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let written: Vec<u8> = (1..=100).collect();
        {
            use std::io::Write;
            let mut file = std::fs::File::create(dir.path().join("movie.mp4")).unwrap();
            file.set_len(1000).unwrap();
            file.write_all(&written).unwrap();
        }
        let server = LocalFileServer::new(dir.path());

        let hole = RangeRequest::From { start: 500, end: Some(599) };
        let err = server.open("movie.mp4", Some(&hole), Some(100)).await.unwrap_err();
        assert_eq!(err, DomainError::RangeUnsatisfiable { size: 100 });

        let straddling = RangeRequest::From { start: 50, end: Some(599) };
        let file = server.open("movie.mp4", Some(&straddling), Some(100)).await.unwrap();
        assert_eq!(file.range, Some(ByteRange { start: 50, end: 99 }));
        assert_eq!(body(file, 4096).await, &written[50..]);

        let file = server.open("movie.mp4", None, Some(100)).await.unwrap();
        assert_eq!(file.content_length(), 100);
        assert_eq!(body(file, 4096).await, written);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_rejected() {
        let (dir, server, _) = fixture(10).await;
        let outside = tempfile::tempdir().unwrap();
        tokio::fs::write(outside.path().join("secret.txt"), b"secret").await.unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("leak.mp4")).unwrap();

        let err = server.open("leak.mp4", None, None).await.unwrap_err();
        assert_eq!(err.code(), "path_traversal");
    }
}
