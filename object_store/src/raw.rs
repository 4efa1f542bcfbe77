use async_trait::async_trait;
use kaldb_config::object_store::{ObjectStoreConfig, ObjectStoreMode};
use std::{error, fmt, io, path::Path, sync::Arc};
use tokio::fs;

use crate::file::FileBackedObjectStore;

/// Thread-safe boxed error.
pub type BoxedError = Box<dyn error::Error + Send + Sync>;

/// Failure of a blob store operation.
///
/// The blob store surfaces a single recoverable error kind: whatever went
/// wrong (network, permissions, missing blob), the owning task fails as a
/// whole and is retried by reassignment. Directory-level operations have no
/// partial-success reporting; already uploaded files are overwritten or
/// cleaned up by the retry.
#[derive(Debug, thiserror::Error)]
#[error("blob store {operation} failed for {key:?}: {source}")]
pub struct BlobIoError {
    operation: &'static str,
    key: String,
    missing: bool,
    #[source]
    source: BoxedError,
}

impl BlobIoError {
    pub fn new(operation: &'static str, key: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        Self {
            operation,
            key: key.into(),
            missing: false,
            source: source.into(),
        }
    }

    /// A failure caused by the blob not being there, as opposed to an I/O
    /// fault reaching it.
    pub fn missing(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<BoxedError>,
    ) -> Self {
        Self {
            operation,
            key: key.into(),
            missing: true,
            source: source.into(),
        }
    }

    pub fn is_missing_key(&self) -> bool {
        self.missing
    }
}

/// Byte-blob storage for uploaded chunks (AWS S3, Google Cloud Storage,
/// Azure Blobstore etc.). One store instance corresponds to one configured
/// bucket.
///
/// Keys may contain `/` separators; a chunk occupies the key prefix
/// `<chunk_id>/`. The methods of this trait are low-level; chunk-directory
/// operations and typed [`StoredObject`] accessors are defined on
/// `dyn ObjectStore`.
///
/// [`StoredObject`]: crate::StoredObject
#[async_trait]
pub trait ObjectStore: 'static + fmt::Debug + Send + Sync {
    /// Fetches the blob stored under `key`.
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, BlobIoError>;

    /// Stores `value` under `key`, replacing an existing blob.
    async fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<(), BlobIoError>;

    /// Removes the blob stored under `key`.
    async fn remove_raw(&self, key: &str) -> Result<(), BlobIoError>;

    /// Keys under the given prefix, in lexicographic order. An unknown
    /// prefix yields an empty list, not an error.
    async fn list_raw(&self, prefix: &str) -> Result<Vec<String>, BlobIoError>;

    /// URI-style location of this store's bucket, used to render snapshot
    /// paths.
    fn store_prefix(&self) -> String;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, BlobIoError> {
        (**self).get_raw(key).await
    }

    async fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<(), BlobIoError> {
        (**self).put_raw(key, value).await
    }

    async fn remove_raw(&self, key: &str) -> Result<(), BlobIoError> {
        (**self).remove_raw(key).await
    }

    async fn list_raw(&self, prefix: &str) -> Result<Vec<String>, BlobIoError> {
        (**self).list_raw(prefix).await
    }

    fn store_prefix(&self) -> String {
        (**self).store_prefix()
    }
}

impl dyn ObjectStore + '_ {
    /// Uploads every regular file directly under `local_dir` to
    /// `<prefix>/<file_name>`. Fails as a whole on the first sub-file
    /// failure. Returns the total number of bytes uploaded.
    pub async fn put_dir(&self, prefix: &str, local_dir: &Path) -> Result<u64, BlobIoError> {
        let mut uploaded_bytes = 0;
        let mut dir_entries = fs::read_dir(local_dir)
            .await
            .map_err(|err| local_io_error("upload", local_dir, err))?;
        while let Some(entry) = dir_entries
            .next_entry()
            .await
            .map_err(|err| local_io_error("upload", local_dir, err))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| local_io_error("upload", &entry.path(), err))?;
            if !file_type.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                return Err(BlobIoError::new(
                    "upload",
                    entry.path().display().to_string(),
                    "non-UTF-8 file name",
                ));
            };
            let bytes = fs::read(entry.path())
                .await
                .map_err(|err| local_io_error("upload", &entry.path(), err))?;
            uploaded_bytes += bytes.len() as u64;
            self.put_raw(&format!("{prefix}/{file_name}"), bytes).await?;
        }
        Ok(uploaded_bytes)
    }

    /// Downloads every blob under `<prefix>/` into `local_dir`.
    pub async fn copy_to_local(&self, prefix: &str, local_dir: &Path) -> Result<(), BlobIoError> {
        fs::create_dir_all(local_dir)
            .await
            .map_err(|err| local_io_error("download", local_dir, err))?;
        let dir_prefix = format!("{prefix}/");
        for key in self.list_raw(&dir_prefix).await? {
            let bytes = self.get_raw(&key).await?;
            let relative_name = key.strip_prefix(&dir_prefix).unwrap_or(&key);
            let target = local_dir.join(relative_name);
            fs::write(&target, bytes)
                .await
                .map_err(|err| local_io_error("download", &target, err))?;
        }
        Ok(())
    }

    /// Whether at least one blob exists under `<prefix>/`.
    pub async fn exists(&self, prefix: &str) -> Result<bool, BlobIoError> {
        let keys = self.list_raw(&format!("{prefix}/")).await?;
        Ok(!keys.is_empty())
    }

    /// Removes every blob under `<prefix>/`.
    pub async fn remove_dir(&self, prefix: &str) -> Result<(), BlobIoError> {
        for key in self.list_raw(&format!("{prefix}/")).await? {
            self.remove_raw(&key).await?;
        }
        Ok(())
    }
}

fn local_io_error(operation: &'static str, path: &Path, err: io::Error) -> BlobIoError {
    BlobIoError::new(operation, path.display().to_string(), err)
}

/// Builds the blob store described by `config`. The store is rooted at the
/// configured bucket; a file-backed store maps the bucket to a directory
/// under the configured base path.
pub async fn make_object_store(config: &ObjectStoreConfig) -> Arc<dyn ObjectStore> {
    match config.mode {
        ObjectStoreMode::FileBacked => {
            let base_dir = format!("{}/{}", config.file_backed_base_path, config.bucket);
            kaldb_logs::info!(
                "Initialized file-backed blob store for bucket {} at {base_dir}",
                config.bucket
            );
            Arc::new(FileBackedObjectStore::new(base_dir).await)
        }
    }
}
