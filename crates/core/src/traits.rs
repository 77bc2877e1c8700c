//! ObjectStore trait definition
//!
//! The storage capability the transfer layer needs: put, get, and one page
//! of a listing. Implemented by `ferry_s3::S3Client` and by in-memory fakes
//! in tests.

use std::path::PathBuf;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Owner name reported when the service returns an empty display name
pub const UNKNOWN_OWNER: &str = "unknown";

/// Streaming body of a downloaded object
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// One object as reported by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRecord {
    pub key: String,
    pub owner_name: String,
    pub owner_id: String,
    pub last_modified: Timestamp,
}

impl ObjectRecord {
    /// Create a record, substituting `unknown` for an empty owner name
    pub fn new(
        key: impl Into<String>,
        owner_name: impl Into<String>,
        owner_id: impl Into<String>,
        last_modified: Timestamp,
    ) -> Self {
        let owner_name = owner_name.into();
        Self {
            key: key.into(),
            owner_name: if owner_name.is_empty() {
                UNKNOWN_OWNER.to_string()
            } else {
                owner_name
            },
            owner_id: owner_id.into(),
            last_modified,
        }
    }
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub records: Vec<ObjectRecord>,
    /// Continuation token for the next page; `None` when the listing is complete
    pub next: Option<String>,
}

/// A local file ready to be sent as a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
}

/// Storage operations used by the transfer layer
///
/// Implementations must be safe to call concurrently from many transfers.
/// They report failures with the crate's error taxonomy and do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file described by `source` to `bucket/key`, streaming from disk
    async fn put_object(&self, bucket: &str, key: &str, source: UploadSource) -> Result<()>;

    /// Start a download of `bucket/key`
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    /// Fetch one page of `bucket`'s contents starting at `continuation`
    async fn list_objects(&self, bucket: &str, continuation: Option<String>) -> Result<ListPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_record_unknown_owner() {
        let record = ObjectRecord::new("a.jpg", "", "id-1", Timestamp::UNIX_EPOCH);
        assert_eq!(record.owner_name, "unknown");
        assert_eq!(record.owner_id, "id-1");

        let named = ObjectRecord::new("a.jpg", "alice", "id-1", Timestamp::UNIX_EPOCH);
        assert_eq!(named.owner_name, "alice");
    }
}
