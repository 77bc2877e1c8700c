//! Mapping between filesystem paths and object keys
//!
//! Uploads keep the name of the uploaded directory as the first key segment,
//! so uploading `/data/photos` yields keys like `photos/sub/b.jpg`. Bucket
//! downloads recreate the key structure under a directory named after the
//! bucket.

use std::path::{Component, Path, PathBuf};

use futures::Stream;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::work::{Entry, TransferOutcome, WorkItem};

/// Separator used in object keys
pub const KEY_SEPARATOR: char = '/';

/// Derive the object key for `file_path` uploaded as part of the tree at `root_dir`.
///
/// The key is `file_path` relative to the parent of `root_dir`, joined with `/`.
/// Paths that are not valid UTF-8 are refused rather than lossily converted.
pub fn upload_key_for(root_dir: &Path, file_path: &Path) -> Result<String> {
    let base = root_dir.parent().unwrap_or(root_dir);
    let relative = file_path.strip_prefix(base).map_err(|_| {
        Error::InvalidArgument(format!(
            "{} is not inside {}",
            file_path.display(),
            root_dir.display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        if let Component::Normal(name) = component {
            let segment = name.to_str().ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "{} is not valid UTF-8 and cannot become an object key",
                    file_path.display()
                ))
            })?;
            segments.push(segment);
        }
    }

    if segments.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "{} does not name a file",
            file_path.display()
        )));
    }

    Ok(segments.join("/"))
}

/// Split an object key into the segments that become path components.
///
/// Empty, `.` and `..` segments are refused, so every accepted key maps to
/// its own path inside the destination directory.
fn key_segments(key: &str) -> Result<Vec<&str>> {
    key.split(KEY_SEPARATOR)
        .map(|segment| match segment {
            ".." => Err(Error::InvalidArgument(format!(
                "Object key '{key}' escapes the destination directory"
            ))),
            "" | "." => Err(Error::InvalidArgument(format!(
                "Object key '{key}' has an empty or '.' segment"
            ))),
            s => Ok(s),
        })
        .collect()
}

/// Local path for `object_key` when downloading the whole of `bucket`
pub fn download_path_for(bucket: &str, object_key: &str) -> Result<PathBuf> {
    if object_key.is_empty() || is_directory_marker(object_key) {
        return Err(Error::InvalidArgument(format!(
            "Object key '{object_key}' does not name a file"
        )));
    }
    let segments = key_segments(object_key)?;

    let mut path = PathBuf::from(bucket);
    path.extend(segments);
    Ok(path)
}

/// Local path for a single fetched object: `dest_dir/<last key segment>`
pub fn file_path_in(dest_dir: &Path, object_key: &str) -> Result<PathBuf> {
    match object_key.rsplit(KEY_SEPARATOR).next() {
        Some(name) if !matches!(name, "" | "." | "..") => Ok(dest_dir.join(name)),
        _ => Err(Error::InvalidArgument(format!(
            "Object key '{object_key}' does not name a file"
        ))),
    }
}

/// Whether `key` is a zero-length directory placeholder rather than a file
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with(KEY_SEPARATOR)
}

/// Create every missing directory above `path`.
///
/// Directories that already exist, including ones created concurrently by
/// another transfer, are not an error.
pub async fn ensure_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::local_write(parent, &e)),
        _ => Ok(()),
    }
}

/// Enumerate upload work for every file under `root_dir`, depth-first.
///
/// The walk runs on a blocking thread and feeds a channel of `capacity`
/// entries, so at most that many items are buffered ahead of the consumer.
/// Directories that cannot be read end the stream with an error; files whose
/// path cannot become a key are yielded as rejected entries.
pub(crate) fn upload_items(
    root_dir: PathBuf,
    capacity: usize,
) -> impl Stream<Item = Result<Entry>> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(&root_dir).sort_by_file_name() {
            let item = match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_file()
                        || (entry.path_is_symlink() && entry.path().is_file());
                    if !is_file {
                        continue;
                    }
                    let path = entry.path();
                    Ok(match upload_key_for(&root_dir, path) {
                        Ok(key) => Entry::Ready(WorkItem::upload(path, key)),
                        Err(e) => Entry::Rejected(TransferOutcome::failure(
                            WorkItem::upload(path, path.to_string_lossy()),
                            e,
                        )),
                    })
                }
                Err(e) => {
                    let path = e.path().unwrap_or(root_dir.as_path()).to_path_buf();
                    let reason = e
                        .io_error()
                        .map(|io| io.to_string())
                        .unwrap_or_else(|| e.to_string());
                    Err(Error::LocalFileNotFound { path, reason })
                }
            };

            let failed = item.is_err();
            // Receiver dropped: the scheduler has stopped consuming.
            if tx.blocking_send(item).is_err() || failed {
                break;
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_upload_key_includes_root_name() {
        let root = Path::new("/data/photos");
        let key = upload_key_for(root, Path::new("/data/photos/a.jpg")).unwrap();
        assert_eq!(key, "photos/a.jpg");

        let key =
            upload_key_for(Path::new("/data/photos"), Path::new("/data/photos/sub/b.jpg")).unwrap();
        assert_eq!(key, "photos/sub/b.jpg");
    }

    #[test]
    fn test_upload_key_trailing_slash_root() {
        let root = Path::new("/data/photos/");
        let key = upload_key_for(root, Path::new("/data/photos/a.jpg")).unwrap();
        assert_eq!(key, "photos/a.jpg");
    }

    #[test]
    fn test_upload_key_outside_root() {
        let result = upload_key_for(Path::new("/data/photos"), Path::new("/other/a.jpg"));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_download_path_for() {
        assert_eq!(
            download_path_for("mybucket", "x.jpg").unwrap(),
            Path::new("mybucket").join("x.jpg")
        );
        assert_eq!(
            download_path_for("mybucket", "y/z.jpg").unwrap(),
            Path::new("mybucket").join("y").join("z.jpg")
        );
    }

    #[test]
    fn test_download_path_rejects_aliasing_segments() {
        // Each of these would otherwise share mybucket/a/b/c.txt with "a/b/c.txt"
        for key in ["a//b/c.txt", "a/./b/c.txt", "/a/b/c.txt", "./a/b/c.txt"] {
            assert!(
                matches!(download_path_for("mybucket", key), Err(Error::InvalidArgument(_))),
                "{key} should be rejected"
            );
        }
        assert!(download_path_for("mybucket", "a/b/c.txt").is_ok());
    }

    #[test]
    fn test_download_path_rejects_traversal() {
        assert!(download_path_for("mybucket", "../etc/passwd").is_err());
        assert!(download_path_for("mybucket", "a/../../b").is_err());
    }

    #[test]
    fn test_download_path_rejects_directory_keys() {
        assert!(download_path_for("mybucket", "folder/").is_err());
        assert!(download_path_for("mybucket", "").is_err());
        assert!(is_directory_marker("folder/"));
        assert!(!is_directory_marker("folder/file"));
    }

    #[test]
    fn test_file_path_in() {
        let dest = Path::new("/save/folder");
        assert_eq!(
            file_path_in(dest, "path/in/bucket.JPG").unwrap(),
            dest.join("bucket.JPG")
        );
        assert_eq!(file_path_in(dest, "top.txt").unwrap(), dest.join("top.txt"));
        assert_eq!(file_path_in(dest, "a//b.jpg").unwrap(), dest.join("b.jpg"));
        assert!(file_path_in(dest, "dir/").is_err());
        assert!(file_path_in(dest, "dir/..").is_err());
    }

    #[tokio::test]
    async fn test_ensure_parent_dirs_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mybucket").join("y").join("z.jpg");

        ensure_parent_dirs(&target).await.unwrap();
        assert!(tmp.path().join("mybucket").is_dir());
        assert!(tmp.path().join("mybucket").join("y").is_dir());
        assert!(!target.exists());

        ensure_parent_dirs(&target).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_parent_dirs_blocked_by_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("blocker"), b"x").unwrap();

        let target = tmp.path().join("blocker").join("z.jpg");
        let result = ensure_parent_dirs(&target).await;
        assert!(matches!(result, Err(Error::LocalWriteFailed { .. })));
    }

    #[tokio::test]
    async fn test_upload_items_walks_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("photos");
        std::fs::create_dir_all(root.join("sub").join("deep")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("a.jpg"), b"a").unwrap();
        std::fs::write(root.join("sub").join("b.jpg"), b"b").unwrap();
        std::fs::write(root.join("sub").join("deep").join("c.jpg"), b"c").unwrap();

        let items: Vec<WorkItem> = upload_items(root.clone(), 2)
            .map(|r| match r.unwrap() {
                Entry::Ready(item) => item,
                Entry::Rejected(outcome) => panic!("unexpected rejection: {outcome:?}"),
            })
            .collect()
            .await;

        let mut keys: Vec<&str> = items.iter().map(|i| i.object_key()).collect();
        keys.sort();
        assert_eq!(keys, vec!["photos/a.jpg", "photos/sub/b.jpg", "photos/sub/deep/c.jpg"]);

        for item in &items {
            assert!(item.local_path().starts_with(&root));
            assert!(matches!(item, WorkItem::Upload { .. }));
        }
    }

    #[tokio::test]
    async fn test_upload_items_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let items: Vec<Result<Entry>> = upload_items(tmp.path().join("missing"), 4)
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::LocalFileNotFound { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_upload_key_refuses_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let file = Path::new("/data/photos").join(OsStr::from_bytes(b"\xff.jpg"));
        let result = upload_key_for(Path::new("/data/photos"), &file);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_upload_items_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("photos");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(OsStr::from_bytes(b"\xff.jpg")), b"1").unwrap();
        std::fs::write(root.join(OsStr::from_bytes(b"\xfe.jpg")), b"2").unwrap();
        std::fs::write(root.join("ok.jpg"), b"3").unwrap();

        let entries: Vec<Entry> = upload_items(root, 4).map(|r| r.unwrap()).collect().await;
        assert_eq!(entries.len(), 3);

        let ready: Vec<&str> = entries
            .iter()
            .filter_map(|e| match e {
                Entry::Ready(item) => Some(item.object_key()),
                Entry::Rejected(_) => None,
            })
            .collect();
        assert_eq!(ready, vec!["photos/ok.jpg"]);

        let rejected = entries
            .iter()
            .filter(|e| {
                matches!(e, Entry::Rejected(outcome)
                    if matches!(outcome.error(), Some(Error::InvalidArgument(_))))
            })
            .count();
        assert_eq!(rejected, 2);
    }
}
