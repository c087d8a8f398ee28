use crate::collection::{CollectionManager, Health};
use crate::error::EngineError;
use crate::model::{Entity, EntitySet, Id, MvccLogEntry, VersionSet};
use crate::version::Version;
use futures::TryStreamExt;
use std::future::Future;
use tokio::runtime::Handle;

/// Drives `f` to completion on `rt`, stepping out of the async context first
/// when called from inside a runtime worker.
pub fn block_on_engine<F, T>(rt: &Handle, f: F) -> T
where
    F: Future<Output = T>,
{
    match Handle::try_current() {
        Ok(_) => tokio::task::block_in_place(|| rt.block_on(f)),
        Err(_) => rt.block_on(f),
    }
}

/// Blocking facade over one [`CollectionManager`].
///
/// Calling from inside a runtime requires the multi-threaded scheduler.
pub struct CollectionSync {
    inner: CollectionManager,
    rt: Handle,
}

impl CollectionSync {
    pub fn new(inner: CollectionManager, rt: Handle) -> Self {
        Self { inner, rt }
    }

    pub fn inner(&self) -> &CollectionManager {
        &self.inner
    }

    pub fn write(&self, entity: Entity) -> Result<Entity, EngineError> {
        block_on_engine(&self.rt, self.inner.write(entity))
    }

    pub fn delete(&self, id: &Id) -> Result<Version, EngineError> {
        block_on_engine(&self.rt, self.inner.delete(id))
    }

    pub fn load(&self, id: &Id) -> Result<Option<Entity>, EngineError> {
        block_on_engine(&self.rt, self.inner.load(id))
    }

    pub fn load_as_of(&self, id: &Id, max_version: Version) -> Result<Option<Entity>, EngineError> {
        block_on_engine(&self.rt, self.inner.load_as_of(id, max_version))
    }

    pub fn load_many(&self, ids: &[Id]) -> Result<EntitySet, EngineError> {
        block_on_engine(&self.rt, self.inner.load_many(ids))
    }

    pub fn load_version(&self, id: &Id, version: Version) -> Result<Entity, EngineError> {
        block_on_engine(&self.rt, self.inner.load_version(id, version))
    }

    pub fn get_latest_version(&self, id: &Id) -> Result<Option<Version>, EngineError> {
        block_on_engine(&self.rt, self.inner.get_latest_version(id))
    }

    pub fn get_latest_versions(&self, ids: &[Id]) -> Result<VersionSet, EngineError> {
        block_on_engine(&self.rt, self.inner.get_latest_versions(ids))
    }

    /// Whole history of `id`, oldest first, collected eagerly.
    pub fn versions(&self, id: &Id) -> Result<Vec<MvccLogEntry>, EngineError> {
        block_on_engine(&self.rt, self.inner.versions(id).try_collect())
    }

    pub fn compact(&self, entries: &[MvccLogEntry]) -> Result<(), EngineError> {
        block_on_engine(&self.rt, self.inner.compact(entries))
    }

    pub fn clear_version(&self, id: &Id, version: Version) -> Result<(), EngineError> {
        block_on_engine(&self.rt, self.inner.clear_version(id, version))
    }

    pub fn health(&self) -> Health {
        block_on_engine(&self.rt, self.inner.health())
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionSync;
    use crate::config::EngineConfig;
    use crate::model::{Entity, Id, Scope, Value};
    use crate::{EntityEngine, Health};
    use uuid::Uuid;

    #[test]
    fn blocking_calls_outside_a_runtime() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");
        let engine = EntityEngine::in_memory(EngineConfig::default()).expect("engine");
        let users = engine
            .collection(Scope::new(Uuid::new_v4(), "users"))
            .expect("collection");
        let sync = CollectionSync::new(users, rt.handle().clone());

        let id = Id::new("user");
        let written = sync
            .write(Entity::new(id.clone()).with_field("name", "a"))
            .expect("write");
        let loaded = sync.load(&id).expect("load").expect("present");
        assert_eq!(loaded.field("name"), Some(&Value::from("a")));
        assert_eq!(sync.get_latest_version(&id).expect("latest"), written.version());
        assert_eq!(sync.versions(&id).expect("versions").len(), 1);
        assert_eq!(sync.health(), Health::Green);

        sync.delete(&id).expect("delete");
        assert!(sync.load(&id).expect("load").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_calls_inside_a_runtime() {
        let engine = EntityEngine::in_memory(EngineConfig::default()).expect("engine");
        let users = engine
            .collection(Scope::new(Uuid::new_v4(), "users"))
            .expect("collection");
        let sync = CollectionSync::new(users, tokio::runtime::Handle::current());
        let id = Id::new("user");
        sync.write(Entity::new(id.clone()).with_field("n", 1i64))
            .expect("write");
        assert!(sync.load(&id).expect("load").is_some());
    }
}
