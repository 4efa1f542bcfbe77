use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::store::{MetadataStore, MetadataStoreError, WatchEvent, WatchEventKind};

const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// [`MetadataStore`] implementation backed by process memory. Sessions never
/// expire; watch semantics otherwise match a remote store.
#[derive(Debug)]
pub struct InMemoryMetadataStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(BTreeMap::new()),
            events,
        }
    }
}

impl InMemoryMetadataStore {
    fn notify(&self, kind: WatchEventKind, path: &str, payload: Option<Vec<u8>>) {
        // Send only fails when nobody subscribed, which is fine.
        self.events
            .send(WatchEvent {
                kind,
                path: path.to_owned(),
                payload,
            })
            .ok();
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create(&self, path: &str, payload: Vec<u8>) -> Result<(), MetadataStoreError> {
        {
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(path) {
                return Err(MetadataStoreError::AlreadyExists(path.to_owned()));
            }
            entries.insert(path.to_owned(), payload.clone());
        }
        self.notify(WatchEventKind::Created, path, Some(payload));
        Ok(())
    }

    async fn update(&self, path: &str, payload: Vec<u8>) -> Result<(), MetadataStoreError> {
        {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries
                .get_mut(path)
                .ok_or_else(|| MetadataStoreError::NotFound(path.to_owned()))?;
            *entry = payload.clone();
        }
        self.notify(WatchEventKind::Updated, path, Some(payload));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, MetadataStoreError> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(path)
            .cloned()
            .ok_or_else(|| MetadataStoreError::NotFound(path.to_owned()))
    }

    async fn delete(&self, path: &str) -> Result<(), MetadataStoreError> {
        {
            let mut entries = self.entries.lock().unwrap();
            if entries.remove(path).is_none() {
                return Err(MetadataStoreError::NotFound(path.to_owned()));
            }
        }
        self.notify(WatchEventKind::Deleted, path, None);
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<Vec<u8>>, MetadataStoreError> {
        let dir_prefix = format!("{}/", dir.trim_end_matches('/'));
        let entries = self.entries.lock().unwrap();
        let children = entries
            .range(dir_prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&dir_prefix))
            .filter(|(path, _)| !path[dir_prefix.len()..].contains('/'))
            .map(|(_, payload)| payload.clone())
            .collect();
        Ok(children)
    }

    fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}
