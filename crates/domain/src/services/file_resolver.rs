use crate::entities::FileEntry;

/// Picks the file to play when the caller does not choose one: the largest
/// video file, or the largest file of any kind when nothing looks like
/// video. Equal sizes go to the lower index.
pub fn resolve_main_file(files: &[FileEntry]) -> Option<&FileEntry> {
    largest(files.iter().filter(|f| f.is_video())).or_else(|| largest(files.iter()))
}

fn largest<'a>(files: impl Iterator<Item = &'a FileEntry>) -> Option<&'a FileEntry> {
    files.fold(None, |best: Option<&FileEntry>, candidate| match best {
        Some(best)
            if best.length > candidate.length
                || (best.length == candidate.length && best.index < candidate.index) =>
        {
            Some(best)
        }
        _ => Some(candidate),
    })
}
