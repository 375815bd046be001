//! In-memory `ObjectStore` for testing the dispatcher
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ObjectListing, ObjectRecord, ObjectStore};
use crate::error::Error;

#[derive(Debug, Default, Clone)]
pub(crate) struct MemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
    /// the listing fails after yielding this many records
    fail_listing_after: Option<usize>,
    fail_fetch: HashSet<String>,
    fetched: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl MemoryStore {
    pub(crate) fn with_objects(objects: &[(&str, &[u8])]) -> Self {
        MemoryStore {
            objects: objects
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
            ..Default::default()
        }
    }

    pub(crate) fn fail_listing_after(mut self, n: usize) -> Self {
        self.fail_listing_after = Some(n);
        self
    }

    pub(crate) fn fail_fetch(mut self, key: &str) -> Self {
        self.fail_fetch.insert(key.to_string());
        self
    }

    /// keys and paths of the fetch requests, the failed ones included
    pub(crate) fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.fetched.lock().unwrap().clone()
    }
}

#[derive(Debug)]
struct MemoryListing {
    records: std::vec::IntoIter<ObjectRecord>,
    fail_after: Option<usize>,
    yielded: usize,
}

#[async_trait]
impl ObjectListing for MemoryListing {
    async fn next_object(&mut self) -> Result<Option<ObjectRecord>, Error> {
        if self.fail_after == Some(self.yielded) {
            return Err(Error::ServerError {
                status: 500,
                code: "InternalError".to_string(),
                message: "listing interrupted".to_string(),
            });
        }
        self.yielded += 1;
        Ok(self.records.next())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(
        &self,
        _bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Box<dyn ObjectListing>, Error> {
        let mut records = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        for (key, content) in self.objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match key[prefix.len()..].find('/') {
                Some(i) if !recursive => {
                    common_prefixes.insert(key[..prefix.len() + i + 1].to_string());
                }
                _ => records.push(ObjectRecord::new(key.as_str(), content.len() as u64)),
            }
        }
        records.extend(common_prefixes.into_iter().map(|p| ObjectRecord::new(p, 0)));
        Ok(Box::new(MemoryListing {
            records: records.into_iter(),
            fail_after: self.fail_listing_after,
            yielded: 0,
        }))
    }

    async fn fget_object(&self, _bucket: &str, key: &str, path: &Path) -> Result<(), Error> {
        self.fetched
            .lock()
            .unwrap()
            .push((key.to_string(), path.to_path_buf()));
        if self.fail_fetch.contains(key) {
            return Err(Error::ServerError {
                status: 403,
                code: "AccessDenied".to_string(),
                message: "Access Denied".to_string(),
            });
        }
        let content = self.objects.get(key).ok_or_else(|| Error::ServerError {
            status: 404,
            code: "NoSuchKey".to_string(),
            message: "The specified key does not exist.".to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
