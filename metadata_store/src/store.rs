use std::{fmt, sync::Arc};

use async_trait::async_trait;
use kaldb_config::metadata_store::{MetadataStoreConfig, MetadataStoreMode};
use tokio::sync::broadcast;

use crate::memory::InMemoryMetadataStore;

/// Thread-safe boxed error.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Errors during [`MetadataStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum MetadataStoreError {
    #[error("entry already exists: {0}")]
    AlreadyExists(String),
    #[error("entry not found: {0}")]
    NotFound(String),
    #[error("entry (de)serialization failed: {0}")]
    Serialization(#[source] BoxedError),
    #[error("store error: {0}")]
    Store(#[source] BoxedError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Updated,
    Deleted,
}

/// Change notification for a single entry. Watchers receive events for the
/// whole store and filter by the directory they care about.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: String,
    /// Serialized entry for created/updated events; `None` for deletions.
    pub payload: Option<Vec<u8>>,
}

/// Watchable hierarchical key-value store holding cluster metadata.
/// Entries live at `/<prefix>/<directory>/<name>` paths; the store is the
/// authoritative owner of every entity it holds.
///
/// Implementations backed by a remote session must re-establish watches and
/// perform a full resync after a session expires, before the next `list`
/// returns.
#[async_trait]
pub trait MetadataStore: 'static + fmt::Debug + Send + Sync {
    /// Atomically creates the entry.
    ///
    /// # Errors
    ///
    /// Fails with [`MetadataStoreError::AlreadyExists`] on a path collision.
    async fn create(&self, path: &str, payload: Vec<u8>) -> Result<(), MetadataStoreError>;

    /// Replaces the entry payload, last writer wins.
    ///
    /// # Errors
    ///
    /// Fails with [`MetadataStoreError::NotFound`] if the entry does not exist.
    async fn update(&self, path: &str, payload: Vec<u8>) -> Result<(), MetadataStoreError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, MetadataStoreError>;

    async fn delete(&self, path: &str) -> Result<(), MetadataStoreError>;

    /// Payloads of the direct children of `dir`.
    async fn list(&self, dir: &str) -> Result<Vec<Vec<u8>>, MetadataStoreError>;

    /// Subscribes to change events for every entry in the store.
    fn subscribe(&self) -> broadcast::Receiver<WatchEvent>;
}

#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for Arc<T> {
    async fn create(&self, path: &str, payload: Vec<u8>) -> Result<(), MetadataStoreError> {
        (**self).create(path, payload).await
    }

    async fn update(&self, path: &str, payload: Vec<u8>) -> Result<(), MetadataStoreError> {
        (**self).update(path, payload).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, MetadataStoreError> {
        (**self).get(path).await
    }

    async fn delete(&self, path: &str) -> Result<(), MetadataStoreError> {
        (**self).delete(path).await
    }

    async fn list(&self, dir: &str) -> Result<Vec<Vec<u8>>, MetadataStoreError> {
        (**self).list(dir).await
    }

    fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        (**self).subscribe()
    }
}

#[derive(Debug)]
enum MetadataStoreOrigin {
    Config(MetadataStoreConfig),
    Mock(Arc<InMemoryMetadataStore>),
}

/// Factory of [`MetadataStore`]s.
#[derive(Debug)]
pub struct MetadataStoreFactory {
    origin: MetadataStoreOrigin,
}

impl MetadataStoreFactory {
    pub fn new(config: MetadataStoreConfig) -> Self {
        Self {
            origin: MetadataStoreOrigin::Config(config),
        }
    }

    /// Creates a factory with a mock in-memory store shared across
    /// [`Self::create_store()`] calls.
    pub fn mock() -> Self {
        Self {
            origin: MetadataStoreOrigin::Mock(Arc::new(InMemoryMetadataStore::default())),
        }
    }

    pub fn create_store(&self) -> Arc<dyn MetadataStore> {
        match &self.origin {
            MetadataStoreOrigin::Config(config) => match config.mode {
                MetadataStoreMode::InMemory => {
                    kaldb_logs::info!("Initialized InMemory metadata store");
                    Arc::new(InMemoryMetadataStore::default())
                }
            },
            MetadataStoreOrigin::Mock(store) => Arc::new(Arc::clone(store)),
        }
    }
}
