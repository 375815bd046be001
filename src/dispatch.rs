//! The list, usage and download operations on a prefix of a bucket
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use log::{info, warn};
use tokio::fs::metadata;

use crate::error::Error;
use crate::humanize;
use crate::storage::{ObjectRecord, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    List,
    Usage,
    Download,
}

/// What to do, decided from the command line once
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub bucket: String,
    pub prefix: String,
    pub destination: PathBuf,
    /// Nothing is requested if None
    pub mode: Option<Mode>,
}

/// Counters of a download run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    /// skipped because the file is already there
    pub existing: usize,
    /// zero size objects, which are folder markers in general
    pub markers: usize,
    pub failed: usize,
}

/// Make sure the prefix ends with `/` such that it selects a folder
pub fn normalize_prefix(prefix: &str) -> Result<String, Error> {
    if prefix.is_empty() {
        return Err(Error::UserError("prefix not specified"));
    }
    if prefix.ends_with('/') {
        Ok(prefix.to_string())
    } else {
        Ok(format!("{}/", prefix))
    }
}

/// The local file for an object, the key without the prefix under the destination folder.
/// ```
/// use std::path::Path;
/// let path = bucketctl::dispatch::object_path("a/b/c.txt", "a/", Path::new("/tmp")).unwrap();
/// assert_eq!(path, Path::new("/tmp/b/c.txt"));
/// ```
pub fn object_path(key: &str, prefix: &str, destination: &Path) -> Result<PathBuf, Error> {
    let relative = key
        .strip_prefix(prefix)
        .ok_or_else(|| Error::ObjectPathError(key.to_string()))?;
    let mut path = destination.to_path_buf();
    let mut depth = 0;
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        match Path::new(part).components().next() {
            Some(Component::Normal(_)) if Path::new(part).components().count() == 1 => {
                path.push(part);
                depth += 1;
            }
            _ => return Err(Error::ObjectPathError(key.to_string())),
        }
    }
    if depth == 0 {
        return Err(Error::ObjectPathError(key.to_string()));
    }
    Ok(path)
}

async fn file_exists(path: &Path) -> bool {
    match metadata(path).await {
        Ok(_) => true,
        Err(e) => e.kind() != ErrorKind::NotFound,
    }
}

/// List one level under the prefix, sub folders show up with size 0
pub async fn list(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<ObjectRecord>, Error> {
    let prefix = normalize_prefix(prefix)?;
    info!("listing {} {}", bucket, prefix);

    let mut output = Vec::new();
    let mut listing = store.list_objects(bucket, &prefix, false).await?;
    while let Some(object) = listing.next_object().await? {
        info!("{} - {}", object.key, humanize::bytes(object.size));
        output.push(object);
    }
    Ok(output)
}

/// Total size of everything under the prefix
pub async fn usage(store: &dyn ObjectStore, bucket: &str, prefix: &str) -> Result<u64, Error> {
    let prefix = normalize_prefix(prefix)?;

    let mut total = 0u64;
    let mut listing = store.list_objects(bucket, &prefix, true).await?;
    while let Some(object) = listing.next_object().await? {
        total = total.saturating_add(object.size);
    }
    Ok(total)
}

/// Download everything under the prefix into the destination folder.
/// Files already present are kept as they are, failed objects are logged and skipped, and only a
/// listing error stops the download.
pub async fn download(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    destination: &Path,
) -> Result<DownloadSummary, Error> {
    let prefix = normalize_prefix(prefix)?;

    let mut summary = DownloadSummary::default();
    let mut listing = store.list_objects(bucket, &prefix, true).await?;
    while let Some(object) = listing.next_object().await? {
        info!("{} - {}", object.key, humanize::bytes(object.size));
        if object.size == 0 {
            summary.markers += 1;
            continue;
        }

        let path = match object_path(&object.key, &prefix, destination) {
            Ok(p) => p,
            Err(e) => {
                warn!("{} Error: {}", object.key, e);
                summary.failed += 1;
                continue;
            }
        };
        if file_exists(&path).await {
            info!("file exists: {}", path.display());
            summary.existing += 1;
            continue;
        }

        match store.fget_object(bucket, &object.key, &path).await {
            Ok(()) => summary.downloaded += 1,
            Err(e) => {
                warn!("{} Error: {}", object.key, e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

/// Execute the mode of the invocation
pub async fn run(invocation: &Invocation, store: &dyn ObjectStore) -> Result<(), Error> {
    let Invocation {
        bucket,
        prefix,
        destination,
        mode,
    } = invocation;
    match mode {
        Some(Mode::List) => {
            list(store, bucket, prefix).await?;
        }
        Some(Mode::Usage) => {
            info!("Getting usage...");
            let total = usage(store, bucket, prefix).await?;
            info!("Usage: {}", humanize::bytes(total));
        }
        Some(Mode::Download) => {
            let summary = download(store, bucket, prefix, destination).await?;
            info!(
                "Download complete, {} downloaded, {} existing, {} failed",
                summary.downloaded, summary.existing, summary.failed
            );
        }
        None => info!("nothing to do, use -list, -usage or -download"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn reports() -> MemoryStore {
        MemoryStore::with_objects(&[
            ("reports/2020/a.csv", &[b'a'; 100][..]),
            ("reports/2020/", &b""[..]),
            ("reports/2021/b.csv", &[b'b'; 50][..]),
            ("reports-old/c.csv", &[b'c'; 70][..]),
            ("summary.txt", &b"hello, world"[..]),
        ])
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("reports").unwrap(), "reports/");
        assert_eq!(normalize_prefix("reports/").unwrap(), "reports/");
        assert_eq!(normalize_prefix("/").unwrap(), "/");
        assert!(normalize_prefix("").is_err());
    }

    #[test]
    fn test_object_path() {
        assert_eq!(
            object_path("a/b/c.txt", "a/", Path::new("/tmp")).unwrap(),
            PathBuf::from("/tmp/b/c.txt")
        );
        assert_eq!(
            object_path("reports/2020//a.csv", "reports/", Path::new("/data")).unwrap(),
            PathBuf::from("/data/2020/a.csv")
        );
        assert!(object_path("reports/../../etc/passwd", "reports/", Path::new("/tmp")).is_err());
        assert!(object_path("reports/", "reports/", Path::new("/tmp")).is_err());
        assert!(object_path("other/a.csv", "reports/", Path::new("/tmp")).is_err());
    }

    #[tokio::test]
    async fn test_list_one_level() {
        let store = reports();
        let listed = list(&store, "luxedigest", "reports").await.unwrap();
        assert_eq!(
            listed,
            vec![
                ObjectRecord::new("reports/2020/", 0),
                ObjectRecord::new("reports/2021/", 0),
            ]
        );
        assert!(list(&store, "luxedigest", "").await.is_err());
    }

    #[tokio::test]
    async fn test_usage() {
        let store = reports();
        assert_eq!(usage(&store, "luxedigest", "reports/").await.unwrap(), 150);
        assert_eq!(usage(&store, "luxedigest", "reports").await.unwrap(), 150);
        assert_eq!(usage(&store, "luxedigest", "nothing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_listing_error_aborts() {
        let store = reports().fail_listing_after(2);
        assert!(matches!(
            usage(&store, "luxedigest", "reports/").await,
            Err(Error::ServerError { status: 500, .. })
        ));
        assert!(list(&store, "luxedigest", "reports/").await.is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(download(&store, "luxedigest", "reports/", dir.path())
            .await
            .is_err());
        // the folder marker and a.csv are handled before the listing breaks
        assert_eq!(store.fetched().len(), 1);
    }

    #[tokio::test]
    async fn test_download() {
        let store = reports();
        let dir = tempfile::tempdir().unwrap();
        let summary = download(&store, "luxedigest", "reports/", dir.path())
            .await
            .unwrap();
        assert_eq!(
            summary,
            DownloadSummary {
                downloaded: 2,
                existing: 0,
                markers: 1,
                failed: 0,
            }
        );
        assert_eq!(
            std::fs::read(dir.path().join("2020").join("a.csv")).unwrap(),
            vec![b'a'; 100]
        );
        assert_eq!(
            std::fs::read(dir.path().join("2021").join("b.csv")).unwrap(),
            vec![b'b'; 50]
        );
        assert!(!dir.path().join("c.csv").exists());
    }

    #[tokio::test]
    async fn test_download_keeps_existing_files() {
        let store = reports();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("2020")).unwrap();
        std::fs::write(dir.path().join("2020").join("a.csv"), b"local").unwrap();

        let summary = download(&store, "luxedigest", "reports/", dir.path())
            .await
            .unwrap();
        assert_eq!(summary.existing, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(
            std::fs::read(dir.path().join("2020").join("a.csv")).unwrap(),
            b"local"
        );
        assert_eq!(
            store.fetched(),
            vec![(
                "reports/2021/b.csv".to_string(),
                dir.path().join("2021").join("b.csv")
            )]
        );
    }

    #[tokio::test]
    async fn test_download_continues_after_fetch_error() {
        let store = reports().fail_fetch("reports/2020/a.csv");
        let dir = tempfile::tempdir().unwrap();
        let summary = download(&store, "luxedigest", "reports/", dir.path())
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.downloaded, 1);
        assert!(!dir.path().join("2020").join("a.csv").exists());
        assert!(dir.path().join("2021").join("b.csv").exists());
    }

    #[tokio::test]
    async fn test_run() {
        let store = reports();
        let dir = tempfile::tempdir().unwrap();
        let mut invocation = Invocation {
            bucket: "luxedigest".to_string(),
            prefix: "reports".to_string(),
            destination: dir.path().to_path_buf(),
            mode: Some(Mode::Usage),
        };
        run(&invocation, &store).await.unwrap();
        assert!(store.fetched().is_empty());

        invocation.mode = Some(Mode::Download);
        run(&invocation, &store).await.unwrap();
        assert_eq!(store.fetched().len(), 2);

        invocation.mode = None;
        run(&invocation, &store).await.unwrap();

        invocation.mode = Some(Mode::List);
        invocation.prefix = String::new();
        assert!(run(&invocation, &store).await.is_err());
    }
}
