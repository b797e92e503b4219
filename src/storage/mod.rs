//! Object storage shared by the sink and the aggregator.
//!
//! [`RecordStore`] wraps an [`ObjectStore`] (S3, local filesystem or in-memory)
//! and exposes the few operations the pipeline needs: create-only writes,
//! overwrite of the consolidated artifact, reads, and one-level listings.

pub mod error;
pub mod token;

use crate::storage::error::StorageError;
use crate::utils::{default_storage_dir, ensure_dir_exists};
use bytes::Bytes;
use log::{debug, info};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, PutMode, PutOptions,
    PutPayload,
};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn ObjectStore>,
    /// Key prefix taken from the storage url, prepended to every key.
    root: Option<Path>,
    url: String,
    /// The local filesystem backend rejects object attributes such as content type.
    supports_attributes: bool,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordStore<{}>", self.url)
    }
}

impl RecordStore {
    /// Wraps an existing object store.
    pub fn new(store: Arc<dyn ObjectStore>, url: impl Into<String>) -> Self {
        Self {
            store,
            root: None,
            url: url.into(),
            supports_attributes: true,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory://")
    }

    /// Opens the store addressed by `url`, or the default local data
    /// directory when `url` is `None`.
    ///
    /// Recognized forms: `s3://bucket[/root]` (credentials and region come from
    /// the usual `AWS_*` variables), `file:///path`, `/path` and `memory://`.
    pub async fn from_url(url: Option<&str>) -> Result<Self, StorageError> {
        let Some(url) = url else {
            let dir = default_storage_dir()?;
            return Self::local(dir).await;
        };

        if url == "memory://" || url == "memory:" {
            return Ok(Self::in_memory());
        }

        let s3_location = url
            .strip_prefix("s3://")
            .or_else(|| url.strip_prefix("s3a://"));
        if let Some(location) = s3_location {
            return Self::s3(url, location);
        }

        if let Some(path) = url.strip_prefix("file://") {
            return Self::local(PathBuf::from(path)).await;
        }
        if url.starts_with('/') {
            return Self::local(PathBuf::from(url)).await;
        }

        Err(StorageError::InvalidUrl(url.to_string()))
    }

    fn s3(url: &str, location: &str) -> Result<Self, StorageError> {
        let (bucket, root) = match location.split_once('/') {
            Some((bucket, root)) => (bucket, Some(root.trim_matches('/'))),
            None => (location, None),
        };
        if bucket.is_empty() {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StorageError::Configure {
                url: url.to_string(),
                source: e,
            })?;
        info!("Using S3 storage at {}", url);

        Ok(Self {
            store: Arc::new(store),
            root: root.filter(|r| !r.is_empty()).map(Path::from),
            url: url.to_string(),
            supports_attributes: true,
        })
    }

    async fn local(dir: PathBuf) -> Result<Self, StorageError> {
        ensure_dir_exists(&dir).await?;
        let url = format!("file://{}", dir.display());
        let store = LocalFileSystem::new_with_prefix(&dir).map_err(|e| StorageError::Configure {
            url: url.clone(),
            source: e,
        })?;
        info!("Using local storage at {}", dir.display());

        Ok(Self {
            store: Arc::new(store),
            root: None,
            url,
            supports_attributes: false,
        })
    }

    /// Writes a new object. Fails with [`StorageError::AlreadyExists`]
    /// instead of replacing an existing one.
    pub async fn create(
        &self,
        key: &Path,
        body: Bytes,
        content_type: &'static str,
    ) -> Result<(), StorageError> {
        self.put(key, body, content_type, PutMode::Create).await
    }

    /// Writes an object, replacing any previous version in a single put.
    pub async fn overwrite(
        &self,
        key: &Path,
        body: Bytes,
        content_type: &'static str,
    ) -> Result<(), StorageError> {
        self.put(key, body, content_type, PutMode::Overwrite).await
    }

    async fn put(
        &self,
        key: &Path,
        body: Bytes,
        content_type: &'static str,
        mode: PutMode,
    ) -> Result<(), StorageError> {
        let location = self.qualify(key);
        let mut attributes = Attributes::new();
        if self.supports_attributes {
            attributes.insert(Attribute::ContentType, AttributeValue::from(content_type));
        }
        let options = PutOptions {
            mode,
            attributes,
            ..Default::default()
        };

        match self
            .store
            .put_opts(&location, PutPayload::from(body), options)
            .await
        {
            Ok(_) => {
                debug!("Wrote {}", location);
                Ok(())
            }
            Err(object_store::Error::AlreadyExists { .. }) => Err(StorageError::AlreadyExists {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Write {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    pub async fn get(&self, key: &Path) -> Result<Bytes, StorageError> {
        let location = self.qualify(key);
        let read_error = |e| StorageError::Read {
            key: key.to_string(),
            source: e,
        };
        self.store
            .get(&location)
            .await
            .map_err(read_error)?
            .bytes()
            .await
            .map_err(read_error)
    }

    /// Lists the "directories" directly below `prefix`, relative to the store root.
    pub async fn list_prefixes(&self, prefix: &Path) -> Result<Vec<Path>, StorageError> {
        let listing = self.list_one_level(prefix).await?;
        Ok(listing
            .common_prefixes
            .into_iter()
            .map(|p| self.relative(p))
            .collect())
    }

    /// Lists the objects directly below `prefix`, with keys relative to the store root.
    pub async fn list_objects(&self, prefix: &Path) -> Result<Vec<ObjectMeta>, StorageError> {
        let listing = self.list_one_level(prefix).await?;
        Ok(listing
            .objects
            .into_iter()
            .map(|mut meta| {
                meta.location = self.relative(meta.location);
                meta
            })
            .collect())
    }

    async fn list_one_level(
        &self,
        prefix: &Path,
    ) -> Result<object_store::ListResult, StorageError> {
        let location = self.qualify(prefix);
        self.store
            .list_with_delimiter(Some(&location))
            .await
            .map_err(|e| StorageError::List {
                prefix: prefix.to_string(),
                source: e,
            })
    }

    fn qualify<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match &self.root {
            Some(root) => Cow::Owned(root.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    fn relative(&self, path: Path) -> Path {
        match &self.root {
            Some(root) => path.parts().skip(root.parts().count()).collect(),
            None => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_never_overwrites() -> Result<(), StorageError> {
        let store = RecordStore::in_memory();
        let key = Path::from("weather_data/2025-04-01/weather_1.json");

        store
            .create(&key, Bytes::from_static(b"first"), JSON_CONTENT_TYPE)
            .await?;
        let second = store
            .create(&key, Bytes::from_static(b"second"), JSON_CONTENT_TYPE)
            .await;

        assert!(matches!(second, Err(StorageError::AlreadyExists { .. })));
        assert_eq!(store.get(&key).await?, Bytes::from_static(b"first"));
        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_replaces() -> Result<(), StorageError> {
        let store = RecordStore::in_memory();
        let key = Path::from("weather_data/cleaned/out.csv");
        store
            .overwrite(&key, Bytes::from_static(b"a"), CSV_CONTENT_TYPE)
            .await?;
        store
            .overwrite(&key, Bytes::from_static(b"b"), CSV_CONTENT_TYPE)
            .await?;
        assert_eq!(store.get(&key).await?, Bytes::from_static(b"b"));
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_one_level() -> Result<(), StorageError> {
        let store = RecordStore::in_memory();
        for key in [
            "weather_data/2025-04-01/weather_1.json",
            "weather_data/2025-04-01/weather_2.json",
            "weather_data/2025-04-02/weather_3.json",
            "weather_data/readme.txt",
        ] {
            store
                .create(&Path::from(key), Bytes::from_static(b"{}"), JSON_CONTENT_TYPE)
                .await?;
        }

        let prefix = Path::from("weather_data");
        let partitions = store.list_prefixes(&prefix).await?;
        let mut names: Vec<_> = partitions.iter().map(|p| p.to_string()).collect();
        names.sort();
        assert_eq!(names, ["weather_data/2025-04-01", "weather_data/2025-04-02"]);

        let top_level = store.list_objects(&prefix).await?;
        assert_eq!(top_level.len(), 1);
        assert_eq!(top_level[0].location.to_string(), "weather_data/readme.txt");

        let in_partition = store.list_objects(&partitions[0]).await?;
        assert!(!in_partition.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_local_filesystem_store() -> Result<(), StorageError> {
        let temp = tempfile::tempdir().unwrap();
        let url = format!("file://{}", temp.path().join("bucket").display());
        let store = RecordStore::from_url(Some(&url)).await?;
        let key = Path::from("weather_data/unknown/weather_7.json");

        store
            .create(&key, Bytes::from_static(b"{}"), JSON_CONTENT_TYPE)
            .await?;
        assert!(temp
            .path()
            .join("bucket/weather_data/unknown/weather_7.json")
            .is_file());
        assert!(matches!(
            store
                .create(&key, Bytes::from_static(b"[]"), JSON_CONTENT_TYPE)
                .await,
            Err(StorageError::AlreadyExists { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_unknown_scheme() {
        let result = RecordStore::from_url(Some("ftp://example.com/data")).await;
        assert!(matches!(result, Err(StorageError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_root_prefix_is_hidden_from_callers() -> Result<(), StorageError> {
        let mut store = RecordStore::in_memory();
        store.root = Some(Path::from("tenant-a"));
        let key = Path::from("weather_data/2025-04-01/weather_1.json");
        store
            .create(&key, Bytes::from_static(b"{}"), JSON_CONTENT_TYPE)
            .await?;

        let objects = store
            .list_objects(&Path::from("weather_data/2025-04-01"))
            .await?;
        assert_eq!(objects[0].location, key);
        assert_eq!(store.get(&key).await?, Bytes::from_static(b"{}"));
        Ok(())
    }
}
