//! Configuration values
//!
//! `StorageConfig` and `TransferConfig` are built once per process and handed
//! to whatever needs them. Optional defaults may come from a TOML settings
//! file, which never holds credentials.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default storage endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9000";

/// Default signing region
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default number of concurrent transfers
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default download copy buffer size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Bucket addressing style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketLookup {
    /// `http://endpoint/bucket/key`
    #[default]
    Path,
    /// `http://bucket.endpoint/key`
    Dns,
}

impl std::str::FromStr for BucketLookup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "path" => Ok(BucketLookup::Path),
            "dns" => Ok(BucketLookup::Dns),
            _ => Err(Error::InvalidArgument(format!(
                "Bucket lookup must be 'path' or 'dns', got '{s}'"
            ))),
        }
    }
}

/// Connection details for the object store
#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_lookup: BucketLookup,
}

impl StorageConfig {
    /// Create a config for the default endpoint with the given credentials
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket_lookup: BucketLookup::default(),
        }
    }

    /// Check that the endpoint is an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint).map_err(|e| {
            Error::InvalidArgument(format!("Invalid endpoint '{}': {e}", self.endpoint))
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::InvalidArgument(format!(
                    "Endpoint scheme must be http or https, got '{other}'"
                )));
            }
        }

        if self.region.is_empty() {
            return Err(Error::InvalidArgument("Region cannot be empty".to_string()));
        }

        Ok(())
    }
}

// Keep secrets out of debug logs.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket_lookup", &self.bucket_lookup)
            .finish()
    }
}

/// Knobs for the bounded-execution loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Maximum transfers in flight, and the size of each wave
    pub concurrency: usize,
    /// Buffer size used when copying a download body to disk
    pub chunk_size: usize,
    /// Stop admitting work after the wave with the first failure
    pub fail_fast: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            fail_fast: false,
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidArgument(
                "Concurrency must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "Chunk size must be at least 1 byte".to_string(),
            ));
        }
        Ok(())
    }
}

/// Defaults read from the settings file
///
/// Every field is optional; unknown fields (including any attempt to store
/// credentials) are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket_lookup: Option<BucketLookup>,
    pub concurrency: Option<usize>,
    pub chunk_size: Option<usize>,
}

impl Settings {
    /// Location of the default settings file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bucketferry").join("config.toml"))
    }

    /// Parse settings from TOML text
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load settings from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Load settings from `explicit` if given, else from the default path.
    ///
    /// A missing default file yields empty settings.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "Loading settings file");
                Self::load_from(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
