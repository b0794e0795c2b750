//! Template blob storage.
//!
//! Templates are addressed as `scheme://bucket/object/path`. The engine only ever reads
//! them; uploads belong to the surrounding application.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_SCHEME: &str = "gs";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoragePathError {
    #[error("storage path is empty")]
    Empty,
    #[error("storage path {0:?} has no bucket")]
    MissingBucket(String),
    #[error("storage path {0:?} has no object name")]
    MissingObject(String),
}

/// A parsed `scheme://bucket/object` reference. A bare `bucket/object` is read as `gs://`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePath {
    pub scheme: String,
    pub bucket: String,
    pub object: String,
}

impl StoragePath {
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Object name split on `/`, rejecting empty, `.` and `..` segments.
    fn object_segments(&self) -> Option<Vec<&str>> {
        let segments: Vec<&str> = self.object.split('/').collect();
        segments
            .iter()
            .all(|s| !s.is_empty() && *s != "." && *s != ".." && !s.contains('\\'))
            .then_some(segments)
    }
}

impl FromStr for StoragePath {
    type Err = StoragePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StoragePathError::Empty);
        }
        let (scheme, rest) = s.split_once("://").unwrap_or((DEFAULT_SCHEME, s));
        let Some((bucket, object)) = rest.split_once('/') else {
            return Err(if rest.is_empty() {
                StoragePathError::MissingBucket(s.to_string())
            } else {
                StoragePathError::MissingObject(s.to_string())
            });
        };
        if bucket.is_empty() {
            return Err(StoragePathError::MissingBucket(s.to_string()));
        }
        if object.is_empty() {
            return Err(StoragePathError::MissingObject(s.to_string()));
        }
        Ok(Self::new(scheme, bucket, object))
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.object)
    }
}

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("object path {0} escapes the storage root")]
    InvalidObjectPath(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "http")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Read-only access to template blobs.
pub trait BlobStore: Send + Sync {
    fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, BlobStoreError>;
}

/// In-memory store, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<StoragePath, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: StoragePath, bytes: Vec<u8>) {
        self.blobs.insert(path, bytes);
    }

    pub fn with_blob(mut self, path: StoragePath, bytes: Vec<u8>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, BlobStoreError> {
        self.blobs
            .get(path)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(path.to_string()))
    }
}

/// Blobs laid out on disk as `<root>/<bucket>/<object>`; the scheme is ignored.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &StoragePath) -> Result<PathBuf, BlobStoreError> {
        let invalid = || BlobStoreError::InvalidObjectPath(path.to_string());
        if path.bucket == "." || path.bucket == ".." || path.bucket.contains('\\') {
            return Err(invalid());
        }
        let segments = path.object_segments().ok_or_else(invalid)?;
        let mut resolved = self.root.join(&path.bucket);
        resolved.extend(segments);
        Ok(resolved)
    }
}

impl BlobStore for DirectoryBlobStore {
    fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, BlobStoreError> {
        let file = self.resolve(path)?;
        log::debug!("reading template blob {path} from {}", file.display());
        std::fs::read(&file).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => BlobStoreError::NotFound(path.to_string()),
            _ => BlobStoreError::Io { path: file, source },
        })
    }
}

#[cfg(feature = "http")]
pub use http::HttpBlobStore;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use reqwest::StatusCode;

    use super::{BlobStore, BlobStoreError, StoragePath};

    /// Blobs served over HTTP(S) as `<base_url>/<bucket>/<object>`.
    #[derive(Debug, Clone)]
    pub struct HttpBlobStore {
        client: Client,
        base_url: String,
    }

    impl HttpBlobStore {
        pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BlobStoreError> {
            let client = Client::builder().timeout(timeout).build()?;
            Ok(Self {
                client,
                base_url: base_url.into().trim_end_matches('/').to_string(),
            })
        }

        fn url(&self, path: &StoragePath) -> Result<String, BlobStoreError> {
            if path.object_segments().is_none() {
                return Err(BlobStoreError::InvalidObjectPath(path.to_string()));
            }
            Ok(format!("{}/{}/{}", self.base_url, path.bucket, path.object))
        }
    }

    impl BlobStore for HttpBlobStore {
        fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, BlobStoreError> {
            let url = self.url(path)?;
            log::debug!("fetching template blob {path} from {url}");
            let response = self.client.get(&url).send()?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(BlobStoreError::NotFound(path.to_string()));
            }
            Ok(response.error_for_status()?.bytes()?.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn parses_storage_paths() {
        assert_eq!(
            "gs://club-templates/12/agenda v2.xlsx".parse::<StoragePath>(),
            Ok(StoragePath::new("gs", "club-templates", "12/agenda v2.xlsx"))
        );
        assert_eq!(
            "bucket/a.xlsx".parse::<StoragePath>(),
            Ok(StoragePath::new("gs", "bucket", "a.xlsx"))
        );
        assert_eq!(
            "s3://b/o".parse::<StoragePath>().map(|p| p.to_string()),
            Ok("s3://b/o".to_string())
        );
    }

    #[test]
    fn rejects_incomplete_paths() {
        assert_eq!("".parse::<StoragePath>(), Err(StoragePathError::Empty));
        assert!(matches!(
            "gs://bucket".parse::<StoragePath>(),
            Err(StoragePathError::MissingObject(_))
        ));
        assert!(matches!(
            "gs://bucket/".parse::<StoragePath>(),
            Err(StoragePathError::MissingObject(_))
        ));
        assert!(matches!(
            "gs:///object".parse::<StoragePath>(),
            Err(StoragePathError::MissingBucket(_))
        ));
    }

    #[test]
    fn memory_store_reports_missing_blobs() {
        let path = StoragePath::new("gs", "b", "t.xlsx");
        let store = MemoryBlobStore::new().with_blob(path.clone(), b"xlsx".to_vec());
        assert_eq!(store.fetch(&path).unwrap(), b"xlsx");
        assert!(matches!(
            store.fetch(&StoragePath::new("gs", "b", "other.xlsx")),
            Err(BlobStoreError::NotFound(_))
        ));
    }

    #[test]
    fn directory_store_reads_bucket_layout_and_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates/club-7")).unwrap();
        std::fs::write(dir.path().join("templates/club-7/agenda.xlsx"), b"bytes").unwrap();
        let store = DirectoryBlobStore::new(dir.path());

        let found = store
            .fetch(&"gs://templates/club-7/agenda.xlsx".parse().unwrap())
            .unwrap();
        assert_eq!(found, b"bytes");

        assert!(matches!(
            store.fetch(&"gs://templates/missing.xlsx".parse().unwrap()),
            Err(BlobStoreError::NotFound(_))
        ));
        for escaping in ["gs://templates/../secret", "gs://../x/y", "gs://t/a//b"] {
            assert!(
                matches!(
                    store.fetch(&escaping.parse().unwrap()),
                    Err(BlobStoreError::InvalidObjectPath(_))
                ),
                "{escaping}"
            );
        }
    }
}
