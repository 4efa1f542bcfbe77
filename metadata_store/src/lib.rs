mod cached;
mod memory;
mod store;
mod stores;
mod typed;

pub use self::{
    cached::CachedStore,
    memory::InMemoryMetadataStore,
    store::{
        MetadataStore, MetadataStoreError, MetadataStoreFactory, WatchEvent, WatchEventKind,
    },
    stores::{DatasetStore, RecoveryNodeStore, RecoveryTaskStore, SnapshotStore},
    typed::{MetadataRecord, TypedStore, TypedWatch, TypedWatchEvent},
};
