//! Bounded-execution loop for bulk transfers
//!
//! Work items are admitted in waves of at most `concurrency` transfers. Each
//! admitted item takes a permit and is spawned immediately; once the wave is
//! full the scheduler waits for every transfer in it to finish before
//! admitting more. This caps open files, sockets and buffers at the cost of
//! letting one slow transfer hold up the next wave.

use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use tokio::task::JoinSet;

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::executor::TransferExecutor;
use crate::keymap;
use crate::limiter::ConcurrencyLimiter;
use crate::lister::BucketLister;
use crate::traits::{ObjectRecord, ObjectStore};
use crate::work::{Entry, TransferObserver, TransferOutcome, TransferSummary, WorkItem};

/// Drives uploads, bucket downloads, single gets and listings
pub struct BatchScheduler {
    executor: TransferExecutor,
    limiter: ConcurrencyLimiter,
    lister: BucketLister,
    config: TransferConfig,
}

impl BatchScheduler {
    pub fn new(store: Arc<dyn ObjectStore>, config: TransferConfig) -> Self {
        let executor =
            TransferExecutor::new(Arc::clone(&store)).with_chunk_size(config.chunk_size);
        Self {
            executor,
            limiter: ConcurrencyLimiter::new(config.concurrency),
            lister: BucketLister::new(store),
            config,
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Upload every file under `root_dir` into `bucket`.
    ///
    /// Keys start with the name of `root_dir` itself (see `keymap::upload_key_for`).
    pub async fn run_upload(
        &self,
        root_dir: &Path,
        bucket: &str,
        observer: &dyn TransferObserver,
    ) -> Result<TransferSummary> {
        let root = resolve_upload_root(root_dir).await?;
        tracing::debug!(root = %root.display(), bucket, "Starting upload");

        let entries = keymap::upload_items(root, self.limiter.capacity());
        self.run_bounded(entries, bucket, observer).await
    }

    /// Download every object in `bucket` to `dest_root/<bucket>/<key>`.
    ///
    /// Directory placeholder keys (ending in `/`) are skipped.
    pub async fn run_download_bucket(
        &self,
        bucket: &str,
        dest_root: &Path,
        observer: &dyn TransferObserver,
    ) -> Result<TransferSummary> {
        tracing::debug!(bucket, dest = %dest_root.display(), "Starting bucket download");

        let dest_root = dest_root.to_path_buf();
        let bucket_name = bucket.to_string();
        let entries = self.lister.list(bucket).filter_map(move |record| {
            let entry = record.map(|record| download_entry(&dest_root, &bucket_name, record));
            futures::future::ready(entry.transpose())
        });
        self.run_bounded(entries, bucket, observer).await
    }

    /// Fetch one object into `dest_dir`, named after the last segment of its key.
    ///
    /// Fails with `InvalidArgument` before touching the store when `dest_dir`
    /// is not an existing directory. Transfer failures are reported in the
    /// returned outcome.
    pub async fn run_download_one(
        &self,
        object_key: &str,
        dest_dir: &Path,
        bucket: &str,
    ) -> Result<TransferOutcome> {
        check_destination_dir(dest_dir).await?;
        let dest = keymap::file_path_in(dest_dir, object_key)?;

        let permit = self.limiter.acquire().await?;
        Ok(self
            .executor
            .execute(WorkItem::download(object_key, dest), bucket, permit)
            .await)
    }

    /// List `bucket` without taking any permits
    pub fn run_list(
        &self,
        bucket: &str,
    ) -> impl Stream<Item = Result<ObjectRecord>> + Send + 'static {
        self.lister.list(bucket)
    }

    async fn run_bounded<S>(
        &self,
        entries: S,
        bucket: &str,
        observer: &dyn TransferObserver,
    ) -> Result<TransferSummary>
    where
        S: Stream<Item = Result<Entry>>,
    {
        let concurrency = self.limiter.capacity();
        let mut summary = TransferSummary::default();
        let mut wave: JoinSet<TransferOutcome> = JoinSet::new();
        let mut entries = std::pin::pin!(entries);

        while let Some(entry) = entries.next().await {
            let item = match entry {
                Ok(Entry::Ready(item)) => item,
                Ok(Entry::Rejected(outcome)) => {
                    observer.on_outcome(&outcome);
                    summary.record(outcome);
                    if self.config.fail_fast {
                        // The rejection belongs to the wave being filled.
                        self.drain(&mut wave, &mut summary, observer).await?;
                        return Ok(abort(summary));
                    }
                    continue;
                }
                Err(e) => {
                    // Enumeration failed: let the running wave finish, then stop.
                    self.drain(&mut wave, &mut summary, observer).await?;
                    return Err(e);
                }
            };

            let permit = self.limiter.acquire().await?;
            let executor = self.executor.clone();
            let bucket = bucket.to_string();
            wave.spawn(async move {
                let fallback = item.clone();
                AssertUnwindSafe(executor.execute(item, &bucket, permit))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        TransferOutcome::failure(
                            fallback,
                            Error::Io(std::io::Error::other("transfer task panicked")),
                        )
                    })
            });

            if wave.len() == concurrency {
                let failed = self.drain(&mut wave, &mut summary, observer).await?;
                if failed && self.config.fail_fast {
                    return Ok(abort(summary));
                }
            }
        }

        self.drain(&mut wave, &mut summary, observer).await?;

        tracing::info!(
            bucket,
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            bytes = summary.bytes,
            waves = summary.waves,
            "Run complete"
        );
        Ok(summary)
    }

    /// Wait for every transfer in `wave`; returns whether any of them failed
    async fn drain(
        &self,
        wave: &mut JoinSet<TransferOutcome>,
        summary: &mut TransferSummary,
        observer: &dyn TransferObserver,
    ) -> Result<bool> {
        if wave.is_empty() {
            return Ok(false);
        }

        let size = wave.len();
        let mut failed = false;
        while let Some(joined) = wave.join_next().await {
            let outcome = joined.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
            failed |= !outcome.is_success();
            observer.on_outcome(&outcome);
            summary.record(outcome);
        }

        summary.waves += 1;
        tracing::debug!(wave = summary.waves, size, "Wave complete");
        observer.on_wave_complete(summary.waves, size);
        Ok(failed)
    }
}

fn abort(mut summary: TransferSummary) -> TransferSummary {
    tracing::warn!(
        succeeded = summary.succeeded,
        failed = summary.failures.len(),
        "Stopping after first failed wave"
    );
    summary.aborted = true;
    summary
}

fn download_entry(dest_root: &Path, bucket: &str, record: ObjectRecord) -> Option<Entry> {
    if keymap::is_directory_marker(&record.key) {
        tracing::debug!(key = %record.key, "Skipping directory placeholder");
        return None;
    }

    Some(match keymap::download_path_for(bucket, &record.key) {
        Ok(path) => Entry::Ready(WorkItem::download(record.key, dest_root.join(path))),
        Err(e) => Entry::Rejected(TransferOutcome::failure(
            WorkItem::download(record.key, dest_root.join(bucket)),
            e,
        )),
    })
}

async fn resolve_upload_root(root_dir: &Path) -> Result<PathBuf> {
    let metadata = tokio::fs::metadata(root_dir).await.map_err(|e| {
        Error::InvalidArgument(format!(
            "Upload source {} is not accessible: {e}",
            root_dir.display()
        ))
    })?;
    if !metadata.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "Upload source {} is not a directory",
            root_dir.display()
        )));
    }

    let absolute = std::path::absolute(root_dir).map_err(|e| Error::local_file(root_dir, &e))?;
    Ok(normalize_lexically(&absolute))
}

/// Drop `.` components and fold `..` into its parent without touching the
/// filesystem, so a symlinked root keeps the name it was given.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

async fn check_destination_dir(dest_dir: &Path) -> Result<()> {
    match tokio::fs::metadata(dest_dir).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        _ => Err(Error::InvalidArgument(format!(
            "Destination {} is not an existing directory",
            dest_dir.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ListPage, MockObjectStore};
    use jiff::Timestamp;

    fn config(concurrency: usize) -> TransferConfig {
        TransferConfig {
            concurrency,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_rejects_missing_destination_before_network() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockObjectStore::new();
        store.expect_get_object().never();

        let scheduler = BatchScheduler::new(Arc::new(store), config(10));
        let result = scheduler
            .run_download_one("a/b.jpg", &tmp.path().join("missing"), "mybucket")
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_get_rejects_file_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        let mut store = MockObjectStore::new();
        store.expect_get_object().never();

        let scheduler = BatchScheduler::new(Arc::new(store), config(10));
        let result = scheduler.run_download_one("a/b.jpg", &file, "mybucket").await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_get_writes_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockObjectStore::new();
        store
            .expect_get_object()
            .times(1)
            .returning(|_, _| Ok(Box::new(std::io::Cursor::new(b"img".to_vec()))));

        let scheduler = BatchScheduler::new(Arc::new(store), config(10));
        let outcome = scheduler
            .run_download_one("path/in/bucket.JPG", tmp.path(), "mybucket")
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.item.local_path(), tmp.path().join("bucket.JPG"));
        assert_eq!(std::fs::read(tmp.path().join("bucket.JPG")).unwrap(), b"img");
        assert_eq!(scheduler.limiter().available(), 10);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_directory_root() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("single.jpg");
        std::fs::write(&file, b"x").unwrap();

        let mut store = MockObjectStore::new();
        store.expect_put_object().never();

        let scheduler = BatchScheduler::new(Arc::new(store), config(10));
        let result = scheduler.run_upload(&file, "mybucket", &()).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = scheduler
            .run_upload(&tmp.path().join("missing"), "mybucket", &())
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_download_bucket_skips_markers_and_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockObjectStore::new();
        store.expect_list_objects().times(1).returning(|_, _| {
            Ok(ListPage {
                records: vec![
                    ObjectRecord::new("folder/", "", "", Timestamp::UNIX_EPOCH),
                    ObjectRecord::new("../evil", "", "", Timestamp::UNIX_EPOCH),
                    ObjectRecord::new("folder/ok.txt", "", "", Timestamp::UNIX_EPOCH),
                ],
                next: None,
            })
        });
        store
            .expect_get_object()
            .times(1)
            .returning(|_, _| Ok(Box::new(std::io::Cursor::new(b"ok".to_vec()))));

        let scheduler = BatchScheduler::new(Arc::new(store), config(4));
        let summary = scheduler
            .run_download_bucket("mybucket", tmp.path(), &())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].item.object_key(), "../evil");
        assert!(tmp.path().join("mybucket").join("folder").join("ok.txt").is_file());
        assert!(!tmp.path().join("evil").exists());
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_, _| Err(Error::StorageUnavailable("access denied".to_string())));

        let scheduler = BatchScheduler::new(Arc::new(store), config(4));
        let result = scheduler.run_download_bucket("mybucket", tmp.path(), &()).await;
        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
    }

    #[test]
    fn test_normalize_lexically_keeps_link_names() {
        assert_eq!(
            normalize_lexically(Path::new("/data/./x/../photos")),
            PathBuf::from("/data/photos")
        );
        assert_eq!(normalize_lexically(Path::new("/data/photos/")), PathBuf::from("/data/photos"));
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
    }
}
