//! Single-item transfers
//!
//! Each call moves exactly one file or object and owns the permit it was
//! given for its whole duration.

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::keymap::ensure_parent_dirs;
use crate::limiter::Permit;
use crate::traits::{ObjectStore, UploadSource};
use crate::work::{TransferOutcome, WorkItem};

/// Performs uploads and downloads against an `ObjectStore`
#[derive(Clone)]
pub struct TransferExecutor {
    store: Arc<dyn ObjectStore>,
    chunk_size: usize,
}

impl TransferExecutor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the buffer size used when writing downloads to disk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run `item` against `bucket` and report its outcome
    pub async fn execute(&self, item: WorkItem, bucket: &str, permit: Permit) -> TransferOutcome {
        let result = match &item {
            WorkItem::Upload {
                local_path,
                object_key,
            } => self.upload_one(local_path, object_key, bucket, permit).await,
            WorkItem::Download {
                object_key,
                local_path,
            } => self.download_one(object_key, local_path, bucket, permit).await,
        };

        match result {
            Ok(bytes) => TransferOutcome::success(item, bytes),
            Err(e) => {
                tracing::warn!(item = %item, error = %e, "Transfer failed");
                TransferOutcome::failure(item, e)
            }
        }
    }

    /// Upload `local_path` to `bucket/object_key`; returns the bytes sent
    pub async fn upload_one(
        &self,
        local_path: &Path,
        object_key: &str,
        bucket: &str,
        permit: Permit,
    ) -> Result<u64> {
        let _permit = permit;
        tracing::debug!(path = %local_path.display(), key = object_key, "Uploading");

        let file = File::open(local_path)
            .await
            .map_err(|e| Error::local_file(local_path, &e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| Error::local_file(local_path, &e))?;
        if !metadata.is_file() {
            return Err(Error::LocalFileNotFound {
                path: local_path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }
        drop(file);

        let source = UploadSource {
            path: local_path.to_path_buf(),
            size: metadata.len(),
            content_type: mime_guess::from_path(local_path)
                .first_or_octet_stream()
                .to_string(),
        };

        self.store.put_object(bucket, object_key, source).await?;
        Ok(metadata.len())
    }

    /// Download `bucket/object_key` into `dest`; returns the bytes written.
    ///
    /// Missing parent directories are created first. The body is copied in
    /// `chunk_size` pieces, so memory use does not grow with object size.
    /// A partially written file is removed on failure.
    pub async fn download_one(
        &self,
        object_key: &str,
        dest: &Path,
        bucket: &str,
        permit: Permit,
    ) -> Result<u64> {
        let _permit = permit;
        tracing::debug!(key = object_key, path = %dest.display(), "Downloading");

        let body = self.store.get_object(bucket, object_key).await?;
        ensure_parent_dirs(dest).await?;

        let file = File::create(dest)
            .await
            .map_err(|e| Error::local_write(dest, &e))?;

        match self.copy_body(body, file, dest).await {
            Ok(written) => Ok(written),
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(dest).await {
                    tracing::debug!(
                        path = %dest.display(),
                        error = %rm,
                        "Could not remove partial file"
                    );
                }
                Err(e)
            }
        }
    }

    async fn copy_body(
        &self,
        mut body: crate::traits::ObjectBody,
        mut file: File,
        dest: &Path,
    ) -> Result<u64> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        loop {
            let n = body
                .read(&mut buf)
                .await
                .map_err(|e| Error::StorageUnavailable(format!("Reading object body: {e}")))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .await
                .map_err(|e| Error::local_write(dest, &e))?;
            written += n as u64;
        }

        file.flush().await.map_err(|e| Error::local_write(dest, &e))?;
        Ok(written)
    }
}
