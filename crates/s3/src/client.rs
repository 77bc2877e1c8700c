//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from ferry-core.

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use jiff::Timestamp;

use ferry_core::{
    BucketLookup, Error, ListPage, ObjectBody, ObjectRecord, ObjectStore, Result, StorageConfig,
    UploadSource,
};

/// Service error codes that mean the requested key does not exist
const MISSING_KEY_CODES: &[&str] = &["NoSuchKey", "NotFound"];

/// S3 client wrapper
///
/// The underlying SDK client is safe to share between concurrent transfers.
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from explicit connection settings
    ///
    /// No request is made; connection problems surface on the first call.
    /// Failed requests are never retried.
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let credentials = aws_credential_types::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None, // session token
            None, // expiry
            "ferry-static-credentials",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .retry_config(aws_config::retry::RetryConfig::disabled())
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.bucket_lookup == BucketLookup::Path)
            .build();

        tracing::debug!(endpoint = %config.endpoint, region = %config.region, "Created S3 client");

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E, R>(error: &SdkError<E, R>) -> String
    where
        E: ProvideErrorMetadata + std::fmt::Display + std::fmt::Debug,
        R: std::fmt::Debug,
    {
        match error {
            SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let mut msg = format!("Service error: {err}");
                if let Some(code) = err.code() {
                    msg.push_str(&format!(" (code: {code})"));
                }
                if let Some(message) = err.message() {
                    msg.push_str(&format!(": {message}"));
                }
                msg
            }
            SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {err:?}")
            }
            SdkError::TimeoutError(_) => "Request timeout".to_string(),
            SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {err:?}")
            }
            SdkError::ResponseError(err) => {
                format!("Response error: {err:?}")
            }
            _ => format!("{error:?}"),
        }
    }

    /// Service error code, if the failure came back from the service
    fn error_code<E, R>(error: &SdkError<E, R>) -> Option<&str>
    where
        E: ProvideErrorMetadata,
    {
        match error {
            SdkError::ServiceError(service_err) => service_err.err().code(),
            _ => None,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(&self, bucket: &str, key: &str, source: UploadSource) -> Result<()> {
        let body = ByteStream::from_path(&source.path)
            .await
            .map_err(|e| Error::LocalFileNotFound {
                path: source.path.clone(),
                reason: e.to_string(),
            })?;

        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(source.size as i64)
            .content_type(&source.content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(Self::format_sdk_error(&e)))?;

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if Self::error_code(&e).is_some_and(|c| MISSING_KEY_CODES.contains(&c)) {
                    Error::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    Error::StorageUnavailable(Self::format_sdk_error(&e))
                }
            })?;

        Ok(Box::new(Box::pin(response.body.into_async_read())))
    }

    async fn list_objects(&self, bucket: &str, continuation: Option<String>) -> Result<ListPage> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .fetch_owner(true)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| {
                if Self::error_code(&e) == Some("NoSuchBucket") {
                    Error::StorageUnavailable(format!("Bucket not found: {bucket}"))
                } else {
                    Error::StorageUnavailable(Self::format_sdk_error(&e))
                }
            })?;

        let records = response
            .contents()
            .iter()
            .map(|object| {
                let (owner_name, owner_id) = object
                    .owner()
                    .map(|o| {
                        (
                            o.display_name().unwrap_or_default(),
                            o.id().unwrap_or_default(),
                        )
                    })
                    .unwrap_or_default();

                let last_modified = object
                    .last_modified()
                    .and_then(|dt| Timestamp::from_second(dt.secs()).ok())
                    .unwrap_or(Timestamp::UNIX_EPOCH);

                ObjectRecord::new(
                    object.key().unwrap_or_default(),
                    owner_name,
                    owner_id,
                    last_modified,
                )
            })
            .collect();

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage { records, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_rejects_bad_endpoint() {
        let mut config = StorageConfig::new("key", "secret");
        config.endpoint = "localhost:9000/no-scheme".to_string();
        assert!(matches!(
            S3Client::new(&config).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_new_builds_without_network() {
        let config = StorageConfig::new("key", "secret");
        let client = S3Client::new(&config).await.unwrap();
        assert_eq!(
            client.inner().config().region().map(|r| r.as_ref()),
            Some("us-west-2")
        );
    }
}
