//! Lazy bucket listing
//!
//! Pages through `ObjectStore::list_objects` one request at a time and
//! flattens the pages into a single stream of records. Nothing beyond the
//! current page is held in memory.

use std::sync::Arc;

use futures::{Stream, TryStreamExt, stream};

use crate::error::Result;
use crate::traits::{ObjectRecord, ObjectStore};

enum Cursor {
    Start,
    Next(String),
    Done,
}

struct ListState {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    cursor: Cursor,
    pages: usize,
}

/// Produces the contents of a bucket as a stream of records
#[derive(Clone)]
pub struct BucketLister {
    store: Arc<dyn ObjectStore>,
}

impl BucketLister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Start a fresh listing of `bucket`.
    ///
    /// Records arrive in the order the service returns them. A page fetch
    /// error ends the stream with that error; it is not retried.
    pub fn list(&self, bucket: &str) -> impl Stream<Item = Result<ObjectRecord>> + Send + 'static {
        let state = ListState {
            store: Arc::clone(&self.store),
            bucket: bucket.to_string(),
            cursor: Cursor::Start,
            pages: 0,
        };

        stream::try_unfold(state, fetch_page)
            .map_ok(|records| stream::iter(records.into_iter().map(Ok)))
            .try_flatten()
    }
}

async fn fetch_page(mut state: ListState) -> Result<Option<(Vec<ObjectRecord>, ListState)>> {
    let token = match std::mem::replace(&mut state.cursor, Cursor::Done) {
        Cursor::Done => return Ok(None),
        Cursor::Start => None,
        Cursor::Next(token) => Some(token),
    };

    let page = state
        .store
        .list_objects(&state.bucket, token.clone())
        .await?;
    state.pages += 1;

    tracing::debug!(
        bucket = %state.bucket,
        page = state.pages,
        records = page.records.len(),
        more = page.next.is_some(),
        "Fetched listing page"
    );

    state.cursor = match page.next {
        Some(next) if next.is_empty() => Cursor::Done,
        Some(next) if token.as_deref() == Some(next.as_str()) => {
            tracing::warn!(
                bucket = %state.bucket,
                token = %next,
                "Listing returned the same continuation token twice, stopping"
            );
            Cursor::Done
        }
        Some(next) => Cursor::Next(next),
        None => Cursor::Done,
    };

    Ok(Some((page.records, state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::traits::{ListPage, MockObjectStore};
    use futures::StreamExt;
    use jiff::Timestamp;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn record(key: &str) -> ObjectRecord {
        ObjectRecord::new(key, "owner", "id", Timestamp::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let mut store = MockObjectStore::new();
        let mut seq = Sequence::new();

        store
            .expect_list_objects()
            .with(eq("mybucket"), eq(None::<String>))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(ListPage {
                    records: vec![record("a"), record("b")],
                    next: Some("t1".to_string()),
                })
            });
        store
            .expect_list_objects()
            .with(eq("mybucket"), eq(Some("t1".to_string())))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(ListPage {
                    records: vec![record("c")],
                    next: None,
                })
            });

        let lister = BucketLister::new(Arc::new(store));
        let keys: Vec<String> = lister
            .list("mybucket")
            .map(|r| r.unwrap().key)
            .collect()
            .await;

        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_empty_bucket() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .times(1)
            .returning(|_, _| Ok(ListPage::default()));

        let lister = BucketLister::new(Arc::new(store));
        let records: Vec<_> = lister.list("empty").collect().await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_list_propagates_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .times(1)
            .returning(|_, _| Err(Error::StorageUnavailable("no such bucket".to_string())));

        let lister = BucketLister::new(Arc::new(store));
        let records: Vec<_> = lister.list("missing").collect().await;

        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], Err(Error::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_list_stops_on_repeated_token() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .times(2)
            .returning(|_, _| {
                Ok(ListPage {
                    records: vec![record("a")],
                    next: Some("same".to_string()),
                })
            });

        let lister = BucketLister::new(Arc::new(store));
        let records: Vec<_> = lister.list("loop").collect().await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_list_is_lazy() {
        let mut store = MockObjectStore::new();
        store.expect_list_objects().times(1).returning(|_, _| {
            Ok(ListPage {
                records: vec![record("a"), record("b")],
                next: Some("more".to_string()),
            })
        });

        let lister = BucketLister::new(Arc::new(store));
        let mut stream = Box::pin(lister.list("big"));

        // Consuming only the first page must not request the second.
        assert_eq!(stream.next().await.unwrap().unwrap().key, "a");
        assert_eq!(stream.next().await.unwrap().unwrap().key, "b");
    }
}
