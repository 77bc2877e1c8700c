//! ferry-s3: S3 SDK adapter for the ferry CLI
//!
//! This crate implements the `ObjectStore` trait from ferry-core on top of
//! aws-sdk-s3, for any S3-compatible endpoint.

mod client;

pub use client::S3Client;
