use std::{collections::HashMap, sync::Arc};

use tokio::{sync::RwLock, task::JoinHandle};

use crate::{
    store::MetadataStoreError,
    typed::{MetadataRecord, TypedStore, TypedWatch, TypedWatchEvent},
};

/// Watch-fed local view over one entity directory.
///
/// Listings read the local snapshot and may lag the authoritative store;
/// writes that need coordination guarantees must go through the underlying
/// [`TypedStore`]. When the watch falls behind, the updater performs a full
/// resync before applying further events.
#[derive(Debug)]
pub struct CachedStore<R: MetadataRecord> {
    typed: TypedStore<R>,
    snapshot: Arc<RwLock<HashMap<String, R>>>,
    updater: JoinHandle<()>,
}

impl<R: MetadataRecord> CachedStore<R> {
    /// Builds the cache: registers the watch, performs the initial resync,
    /// then spawns the updater task applying watch events.
    pub async fn new(typed: TypedStore<R>) -> Result<Self, MetadataStoreError> {
        // The watch must be registered before the initial listing so no
        // update between the two is lost.
        let watch = typed.watch();
        let snapshot = Arc::new(RwLock::new(HashMap::new()));
        resync(&typed, &snapshot).await?;

        let updater = tokio::spawn(run_updater(
            typed.clone(),
            Arc::clone(&snapshot),
            watch,
        ));
        Ok(Self {
            typed,
            snapshot,
            updater,
        })
    }

    /// Records currently in the local snapshot, in unspecified order.
    pub async fn list_cached(&self) -> Vec<R> {
        self.snapshot.read().await.values().cloned().collect()
    }

    pub async fn get_cached(&self, name: &str) -> Option<R> {
        self.snapshot.read().await.get(name).cloned()
    }

    /// The authoritative store behind this cache.
    pub fn store(&self) -> &TypedStore<R> {
        &self.typed
    }
}

impl<R: MetadataRecord> Drop for CachedStore<R> {
    fn drop(&mut self) {
        self.updater.abort();
    }
}

async fn resync<R: MetadataRecord>(
    typed: &TypedStore<R>,
    snapshot: &RwLock<HashMap<String, R>>,
) -> Result<(), MetadataStoreError> {
    let records = typed.list().await?;
    let mut snapshot = snapshot.write().await;
    snapshot.clear();
    snapshot.extend(
        records
            .into_iter()
            .map(|record| (record.name().to_owned(), record)),
    );
    Ok(())
}

async fn run_updater<R: MetadataRecord>(
    typed: TypedStore<R>,
    snapshot: Arc<RwLock<HashMap<String, R>>>,
    mut watch: TypedWatch<R>,
) {
    while let Some(event) = watch.next().await {
        match event {
            TypedWatchEvent::Created(record) | TypedWatchEvent::Updated(record) => {
                let mut snapshot = snapshot.write().await;
                snapshot.insert(record.name().to_owned(), record);
            }
            TypedWatchEvent::Deleted { name } => {
                let mut snapshot = snapshot.write().await;
                snapshot.remove(&name);
            }
            TypedWatchEvent::Lagged => {
                if let Err(err) = resync(&typed, &snapshot).await {
                    kaldb_logs::error!(
                        "Resync of cached {} view failed: {err}",
                        typed.directory()
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kaldb_types::{Offset, RecoveryTask};

    use crate::store::MetadataStoreFactory;

    use super::*;

    fn task(name: &str) -> RecoveryTask {
        RecoveryTask::new(name, "0", Offset(0), Offset(10), 1_000)
    }

    const RETRY_INTERVAL: Duration = Duration::from_millis(10);
    const MAX_RETRIES: usize = 200;

    #[tokio::test]
    async fn cache_follows_store_mutations() {
        let store = MetadataStoreFactory::mock().create_store();
        let typed: TypedStore<RecoveryTask> = TypedStore::new(store, "/kaldb");
        typed.create(&task("t1")).await.unwrap();

        let cached = CachedStore::new(typed.clone()).await.unwrap();
        assert_eq!(cached.list_cached().await, vec![task("t1")]);

        typed.create(&task("t2")).await.unwrap();
        for attempt in 0.. {
            if cached.list_cached().await.len() == 2 {
                break;
            }
            assert!(attempt < MAX_RETRIES, "cache never observed the creation");
            tokio::time::sleep(RETRY_INTERVAL).await;
        }

        typed.delete("t1").await.unwrap();
        for attempt in 0.. {
            if cached.get_cached("t1").await.is_none() {
                break;
            }
            assert!(attempt < MAX_RETRIES, "cache never observed the deletion");
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
        assert_eq!(cached.get_cached("t2").await, Some(task("t2")));
    }
}
