use async_trait::async_trait;
use tokio::fs;

use std::{
    io,
    path::{Path, PathBuf},
};

use crate::raw::{BlobIoError, ObjectStore};

/// [`ObjectStore`] keeping blobs as files under the bucket's base directory.
#[derive(Debug)]
pub struct FileBackedObjectStore {
    base_dir: String,
}

impl FileBackedObjectStore {
    pub async fn new(base_dir: String) -> Self {
        fs::create_dir_all(&base_dir)
            .await
            .expect("failed to create blob store base directory");
        FileBackedObjectStore { base_dir }
    }

    fn filename(&self, key: &str) -> PathBuf {
        Path::new(&self.base_dir).join(key)
    }
}

fn io_error(operation: &'static str, key: &str, err: io::Error) -> BlobIoError {
    if err.kind() == io::ErrorKind::NotFound {
        BlobIoError::missing(operation, key, err)
    } else {
        BlobIoError::new(operation, key, err)
    }
}

#[async_trait]
impl ObjectStore for FileBackedObjectStore {
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, BlobIoError> {
        fs::read(self.filename(key))
            .await
            .map_err(|err| io_error("get", key, err))
    }

    async fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<(), BlobIoError> {
        let filename = self.filename(key);
        if let Some(parent) = filename.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error("put", key, err))?;
        }
        fs::write(filename, value)
            .await
            .map_err(|err| io_error("put", key, err))
    }

    async fn remove_raw(&self, key: &str) -> Result<(), BlobIoError> {
        fs::remove_file(self.filename(key))
            .await
            .map_err(|err| io_error("remove", key, err))
    }

    async fn list_raw(&self, prefix: &str) -> Result<Vec<String>, BlobIoError> {
        let base_dir = PathBuf::from(&self.base_dir);
        let mut keys = Vec::new();
        let mut pending = vec![base_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut dir_entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(io_error("list", prefix, err)),
            };
            loop {
                let entry = match dir_entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => return Err(io_error("list", prefix, err)),
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| io_error("list", prefix, err))?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    if let Some(key) = relative_key(&base_dir, &entry.path()) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn store_prefix(&self) -> String {
        self.base_dir.clone()
    }
}

fn relative_key(base_dir: &Path, file_path: &Path) -> Option<String> {
    let relative = file_path.strip_prefix(base_dir).ok()?;
    let key = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Some(key)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn test_store() -> (TempDir, FileBackedObjectStore) {
        let dir = TempDir::new().expect("failed creating temporary dir");
        let path = dir.path().to_str().unwrap().to_string();
        let store = FileBackedObjectStore::new(path).await;
        (dir, store)
    }

    #[tokio::test]
    async fn test_get() {
        let (_dir, object_store) = test_store().await;
        let expected = vec![9, 0, 8, 9, 0, 7];
        object_store
            .put_raw("test-key.bin", expected.clone())
            .await
            .unwrap();

        let bytes = object_store.get_raw("test-key.bin").await.unwrap();
        assert_eq!(expected, bytes);
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (_dir, object_store) = test_store().await;
        let err = object_store.get_raw("no-such-key.bin").await.unwrap_err();
        assert!(err.is_missing_key(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_put_and_remove_nested_key() {
        let (_dir, object_store) = test_store().await;
        object_store
            .put_raw("chunk-1/segment_0.bin", vec![1, 2, 3])
            .await
            .unwrap();

        let keys = object_store.list_raw("chunk-1/").await.unwrap();
        assert_eq!(keys, vec!["chunk-1/segment_0.bin".to_string()]);

        object_store
            .remove_raw("chunk-1/segment_0.bin")
            .await
            .unwrap();
        let keys = object_store.list_raw("chunk-1/").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let (_dir, object_store) = test_store().await;
        for key in ["a/0.bin", "a/1.bin", "b/0.bin"] {
            object_store.put_raw(key, vec![0]).await.unwrap();
        }

        let keys = object_store.list_raw("a/").await.unwrap();
        assert_eq!(keys, vec!["a/0.bin".to_string(), "a/1.bin".to_string()]);
    }
}
