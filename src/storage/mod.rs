//! The object storage interface consumed by the dispatcher
//!
//! An [`ObjectStore`] produces lazy [`ObjectListing`]s and fetches objects into local files.
//! [`S3Store`] is the implementation speaking the S3 protocol.
use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use serde_derive::Deserialize;

use crate::error::Error;

pub mod auth;
pub mod s3;
mod xml;

#[cfg(test)]
pub(crate) mod memory;

pub use s3::S3Store;

pub static DEFAULT_REGION: &str = "us-east-1";

/// # The request URL style
/// - PATH: `https://host/bucket/key`
/// - HOST: `https://bucket.host/key`, virtual hosted style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStyle {
    PATH,
    HOST,
}

impl Default for UrlStyle {
    fn default() -> Self {
        UrlStyle::PATH
    }
}

/// One entry of a listing.
/// For non-recursive listings the common prefixes show up as records of size 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
}

impl ObjectRecord {
    pub fn new<K: Into<String>>(key: K, size: u64) -> Self {
        ObjectRecord {
            key: key.into(),
            size,
        }
    }
}

/// A lazy sequence of records, the next page is only requested when the consumer asks for it.
/// Dropping the listing cancels it.
#[async_trait]
pub trait ObjectListing: Send + Debug {
    /// `Ok(None)` once the listing is exhausted
    async fn next_object(&mut self) -> Result<Option<ObjectRecord>, Error>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// List objects under `prefix`, descending into nested prefixes if `recursive`
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Box<dyn ObjectListing>, Error>;

    /// Fetch the object into a file at `path`, creating the parent folders
    async fn fget_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), Error>;
}
