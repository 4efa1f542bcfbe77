use async_trait::async_trait;

use std::{collections::HashMap, sync::Mutex};

use crate::raw::{BlobIoError, ObjectStore};

/// In-memory [`ObjectStore`] implementation for tests.
#[derive(Debug, Default)]
pub struct MockStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, BlobIoError> {
        let blobs = self.blobs.lock().unwrap();
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| BlobIoError::missing("get", key, "no such blob"))
    }

    async fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<(), BlobIoError> {
        let mut blobs = self.blobs.lock().unwrap();
        blobs.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove_raw(&self, key: &str) -> Result<(), BlobIoError> {
        let mut blobs = self.blobs.lock().unwrap();
        blobs.remove(key);
        Ok(())
    }

    async fn list_raw(&self, prefix: &str) -> Result<Vec<String>, BlobIoError> {
        let blobs = self.blobs.lock().unwrap();
        let mut keys: Vec<_> = blobs
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn store_prefix(&self) -> String {
        "mock".to_string()
    }
}
