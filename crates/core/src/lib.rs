//! ferry-core: Transfer orchestration for the ferry CLI
//!
//! This crate provides everything between the command line and the storage
//! SDK:
//! - Key/path mapping between local trees and buckets
//! - Lazy, paginated bucket listing
//! - A permit pool bounding concurrent transfers
//! - Single-item upload and download
//! - The wave-based scheduler that ties them together
//!
//! Storage access goes through the `ObjectStore` trait, so the crate has no
//! dependency on any particular S3 SDK and can be tested against fakes.

pub mod config;
pub mod error;
pub mod executor;
pub mod keymap;
pub mod limiter;
pub mod lister;
pub mod scheduler;
pub mod traits;
pub mod work;

pub use config::{BucketLookup, Settings, StorageConfig, TransferConfig};
pub use error::{Error, Result};
pub use executor::TransferExecutor;
pub use keymap::{download_path_for, upload_key_for};
pub use limiter::{ConcurrencyLimiter, Permit};
pub use lister::BucketLister;
pub use scheduler::BatchScheduler;
pub use traits::{ListPage, ObjectBody, ObjectRecord, ObjectStore, UploadSource};
pub use work::{TransferObserver, TransferOutcome, TransferSummary, WorkItem};
