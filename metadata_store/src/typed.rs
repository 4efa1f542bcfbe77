use std::{marker::PhantomData, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;

use crate::store::{MetadataStore, MetadataStoreError, WatchEvent, WatchEventKind};

/// Entity kind storable under its own directory of the coordination store.
/// Entries are serialized with `bincode`; schema evolution goes through
/// serde defaults on new fields.
pub trait MetadataRecord:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// Directory the entity kind lives under, e.g. `recoveryTasks`.
    const DIRECTORY: &'static str;

    /// Unique entry name; the last path segment.
    fn name(&self) -> &str;
}

/// Typed facade over one entity directory of a [`MetadataStore`].
#[derive(Debug)]
pub struct TypedStore<R: MetadataRecord> {
    store: Arc<dyn MetadataStore>,
    dir: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: MetadataRecord> Clone for TypedStore<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            dir: self.dir.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: MetadataRecord> TypedStore<R> {
    pub fn new(store: Arc<dyn MetadataStore>, path_prefix: &str) -> Self {
        let dir = format!("{}/{}", path_prefix.trim_end_matches('/'), R::DIRECTORY);
        Self {
            store,
            dir,
            _record: PhantomData,
        }
    }

    pub fn directory(&self) -> &str {
        &self.dir
    }

    fn entry_path(&self, name: &str) -> String {
        format!("{}/{name}", self.dir)
    }

    fn encode(record: &R) -> Result<Vec<u8>, MetadataStoreError> {
        bincode::serialize(record).map_err(|err| MetadataStoreError::Serialization(err.into()))
    }

    fn decode(payload: &[u8]) -> Result<R, MetadataStoreError> {
        bincode::deserialize(payload).map_err(|err| MetadataStoreError::Serialization(err.into()))
    }

    pub async fn create(&self, record: &R) -> Result<(), MetadataStoreError> {
        let payload = Self::encode(record)?;
        self.store.create(&self.entry_path(record.name()), payload).await
    }

    pub async fn update(&self, record: &R) -> Result<(), MetadataStoreError> {
        let payload = Self::encode(record)?;
        self.store.update(&self.entry_path(record.name()), payload).await
    }

    pub async fn get(&self, name: &str) -> Result<R, MetadataStoreError> {
        let payload = self.store.get(&self.entry_path(name)).await?;
        Self::decode(&payload)
    }

    pub async fn delete(&self, name: &str) -> Result<(), MetadataStoreError> {
        self.store.delete(&self.entry_path(name)).await
    }

    pub async fn list(&self) -> Result<Vec<R>, MetadataStoreError> {
        let payloads = self.store.list(&self.dir).await?;
        payloads.iter().map(|payload| Self::decode(payload)).collect()
    }

    /// Watch over this entity directory, registered before the call returns.
    pub fn watch(&self) -> TypedWatch<R> {
        TypedWatch {
            receiver: self.store.subscribe(),
            dir_prefix: format!("{}/", self.dir),
            _record: PhantomData,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedWatchEvent<R> {
    Created(R),
    Updated(R),
    Deleted { name: String },
    /// The watcher fell behind and events were discarded; the caller must
    /// resync from an authoritative listing.
    Lagged,
}

/// Stream of [`TypedWatchEvent`]s for one entity directory.
#[derive(Debug)]
pub struct TypedWatch<R: MetadataRecord> {
    receiver: broadcast::Receiver<WatchEvent>,
    dir_prefix: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: MetadataRecord> TypedWatch<R> {
    /// Next event for the watched directory, or `None` once the store is gone.
    pub async fn next(&mut self) -> Option<TypedWatchEvent<R>> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    kaldb_logs::warn!("Metadata watch lagged, skipped {skipped} events");
                    return Some(TypedWatchEvent::Lagged);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            let Some(name) = event.path.strip_prefix(&self.dir_prefix) else {
                continue;
            };
            match (event.kind, event.payload) {
                (WatchEventKind::Deleted, _) => {
                    return Some(TypedWatchEvent::Deleted {
                        name: name.to_owned(),
                    });
                }
                (kind, Some(payload)) => match TypedStore::<R>::decode(&payload) {
                    Ok(record) if kind == WatchEventKind::Created => {
                        return Some(TypedWatchEvent::Created(record));
                    }
                    Ok(record) => return Some(TypedWatchEvent::Updated(record)),
                    Err(err) => {
                        kaldb_logs::warn!(
                            "Skipping undecodable watch payload at {}: {err}",
                            event.path
                        );
                    }
                },
                (kind, None) => {
                    kaldb_logs::warn!("Watch event {kind:?} at {} without payload", event.path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use kaldb_types::{Offset, RecoveryTask};

    use crate::store::MetadataStoreFactory;

    use super::*;

    fn task(name: &str) -> RecoveryTask {
        RecoveryTask::new(name, "0", Offset(30), Offset(60), 1_000)
    }

    #[tokio::test]
    async fn typed_store_round_trips_records() {
        let store = MetadataStoreFactory::mock().create_store();
        let tasks: TypedStore<RecoveryTask> = TypedStore::new(store, "/kaldb");

        tasks.create(&task("t1")).await.unwrap();
        assert_eq!(tasks.get("t1").await.unwrap(), task("t1"));
        assert_matches!(
            tasks.create(&task("t1")).await.unwrap_err(),
            MetadataStoreError::AlreadyExists(_)
        );

        tasks.create(&task("t2")).await.unwrap();
        let listed = tasks.list().await.unwrap();
        assert_eq!(listed.len(), 2);

        tasks.delete("t1").await.unwrap();
        assert_matches!(
            tasks.get("t1").await.unwrap_err(),
            MetadataStoreError::NotFound(_)
        );
    }

    #[tokio::test]
    async fn typed_watch_filters_foreign_directories() {
        let store = MetadataStoreFactory::mock().create_store();
        let tasks: TypedStore<RecoveryTask> = TypedStore::new(Arc::clone(&store), "/kaldb");
        let mut watch = tasks.watch();

        // An entry in another directory must not surface in this watch.
        store
            .create("/kaldb/recoveryNodes/n1", vec![0, 1, 2])
            .await
            .unwrap();
        tasks.create(&task("t1")).await.unwrap();
        tasks.delete("t1").await.unwrap();

        assert_matches!(
            watch.next().await.unwrap(),
            TypedWatchEvent::Created(created) if created == task("t1")
        );
        assert_matches!(
            watch.next().await.unwrap(),
            TypedWatchEvent::Deleted { name } if name == "t1"
        );
    }
}
