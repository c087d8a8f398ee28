use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{Entity, EntitySet, Id, MvccEntity, MvccLogEntry, Scope, Stage, VersionSet};
use crate::pipeline::{CommitEvent, Pipeline};
use crate::repair;
use crate::serialization::log_entry::{predecessor, successor};
use crate::serialization::{EntityVersionStore, LogEntryStore, bounded};
use crate::store::ColumnStore;
use crate::store::codec::check_payload;
use crate::version::{Version, VersionClock};
use futures::future::try_join_all;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Green,
    Red,
}

/// Dependencies shared by every collection of one engine.
pub(crate) struct EngineShared {
    pub(crate) config: EngineConfig,
    pub(crate) clock: Arc<VersionClock>,
    pub(crate) store: Arc<dyn ColumnStore>,
    pub(crate) logs: LogEntryStore,
    pub(crate) entities: EntityVersionStore,
    pub(crate) pipeline: Pipeline,
    pub(crate) events: broadcast::Sender<CommitEvent>,
}

/// Entity operations for one scope.
///
/// Cheap to clone. Every call is scoped to the `Scope` the manager was
/// created for; nothing here reads or writes another tenant's rows.
#[derive(Clone)]
pub struct CollectionManager {
    scope: Scope,
    shared: Arc<EngineShared>,
}

impl CollectionManager {
    pub(crate) fn new(scope: Scope, shared: Arc<EngineShared>) -> Self {
        Self { scope, shared }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Writes a full replacement payload at a fresh version.
    pub async fn write(&self, entity: Entity) -> Result<Entity, EngineError> {
        self.shared.pipeline.write(&self.scope, entity).await
    }

    pub async fn delete(&self, id: &Id) -> Result<Version, EngineError> {
        self.shared.pipeline.delete(&self.scope, id.clone()).await
    }

    /// Current committed value, or `None` when deleted or never written.
    pub async fn load(&self, id: &Id) -> Result<Option<Entity>, EngineError> {
        self.load_as_of(id, self.shared.clock.now()).await
    }

    /// Value as of `max_version`. Looks at no more than `repair_window`
    /// versions, and only validates the payloads it resolves from.
    pub async fn load_as_of(
        &self,
        id: &Id,
        max_version: Version,
    ) -> Result<Option<Entity>, EngineError> {
        id.validate()?;
        let rows = self
            .shared
            .entities
            .load_repair_window(&self.scope, id, max_version, self.shared.config.repair_window)
            .await?;
        let visible = self.visible(id, rows).await?;
        match repair::resolve(id, &visible) {
            Err(EngineError::RepairExhausted { scanned, .. }) => {
                warn!(
                    scope = %self.scope,
                    id = %id,
                    scanned,
                    "no complete version within repair window"
                );
                Ok(None)
            }
            other => other,
        }
    }

    pub async fn load_many(&self, ids: &[Id]) -> Result<EntitySet, EngineError> {
        self.check_load_size(ids.len())?;
        let max_version = self.shared.clock.now();
        let found = try_join_all(ids.iter().map(|id| self.load_as_of(id, max_version))).await?;
        let mut set = EntitySet::with_capacity(ids.len());
        for entity in found.into_iter().flatten() {
            set.insert(entity);
        }
        Ok(set)
    }

    /// Payload committed at exactly `version`.
    pub async fn load_version(&self, id: &Id, version: Version) -> Result<Entity, EngineError> {
        let not_found = || EngineError::VersionNotFound {
            id: id.clone(),
            version,
        };
        let row = self
            .shared
            .entities
            .load_version(&self.scope, id, version)
            .await?;
        if !row.is_complete() && !self.is_committed(id, version).await? {
            return Err(not_found());
        }
        row.into_payload().ok_or_else(not_found)
    }

    /// Newest committed version from the log alone; no payload is read.
    pub async fn get_latest_version(&self, id: &Id) -> Result<Option<Version>, EngineError> {
        Ok(self
            .shared
            .logs
            .load_latest_complete(&self.scope, id, self.shared.clock.now())
            .await?
            .map(|entry| entry.version()))
    }

    pub async fn get_latest_versions(&self, ids: &[Id]) -> Result<VersionSet, EngineError> {
        self.shared
            .logs
            .load_latest_many(&self.scope, ids, self.shared.clock.now())
            .await
    }

    /// Every log entry of `id`, oldest first, fetched `log_buffer_size` at a
    /// time.
    pub fn versions(&self, id: &Id) -> BoxStream<'static, Result<MvccLogEntry, EngineError>> {
        let logs = self.shared.logs.clone();
        let scope = self.scope.clone();
        let id = id.clone();
        let page = self.shared.config.log_buffer_size;
        stream::try_unfold(Some(Version::MIN), move |cursor| {
            let logs = logs.clone();
            let scope = scope.clone();
            let id = id.clone();
            async move {
                let Some(min) = cursor else {
                    return Ok(None);
                };
                let entries = logs.load_history(&scope, &id, min, page).await?;
                let next = if entries.len() < page {
                    None
                } else {
                    entries.last().and_then(|e| successor(e.version()))
                };
                Ok::<_, EngineError>(Some((page_stream(entries), next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Log entries of `id` at or below `start`, newest first.
    pub fn versions_from_max_to_min(
        &self,
        id: &Id,
        start: Version,
    ) -> BoxStream<'static, Result<MvccLogEntry, EngineError>> {
        let logs = self.shared.logs.clone();
        let scope = self.scope.clone();
        let id = id.clone();
        let page = self.shared.config.log_buffer_size;
        stream::try_unfold(Some(start), move |cursor| {
            let logs = logs.clone();
            let scope = scope.clone();
            let id = id.clone();
            async move {
                let Some(max) = cursor else {
                    return Ok(None);
                };
                let entries = logs.load_range(&scope, &id, max, page).await?;
                let next = if entries.len() < page {
                    None
                } else {
                    entries.last().and_then(|e| predecessor(e.version()))
                };
                Ok::<_, EngineError>(Some((page_stream(entries), next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Physically removes the listed versions: content row first, then the
    /// log entry, so an interrupted compaction never leaves a row that looks
    /// uncommitted.
    pub async fn compact(&self, entries: &[MvccLogEntry]) -> Result<(), EngineError> {
        try_join_all(entries.iter().map(|entry| async move {
            self.shared
                .entities
                .delete(&self.scope, entry.id(), entry.version())
                .await?;
            self.shared
                .logs
                .delete(&self.scope, entry.id(), entry.version())
                .await
        }))
        .await?;
        info!(scope = %self.scope, versions = entries.len(), "compacted versions");
        Ok(())
    }

    /// Drops the payload stored at a committed `version`, keeping the row in
    /// history. Unknown or uncommitted versions are `VersionNotFound`.
    pub async fn clear_version(&self, id: &Id, version: Version) -> Result<(), EngineError> {
        if !self.is_committed(id, version).await? {
            return Err(EngineError::VersionNotFound {
                id: id.clone(),
                version,
            });
        }
        self.shared
            .entities
            .clear(&self.scope, id, version)
            .await?;
        info!(scope = %self.scope, id = %id, version = %version, "cleared version");
        Ok(())
    }

    pub async fn health(&self) -> Health {
        let result = bounded(
            self.shared.config.store_timeout(),
            "health.ping",
            self.shared.store.ping(),
        )
        .await;
        match result {
            Ok(()) => Health::Green,
            Err(err) => {
                error!(scope = %self.scope, error = %err, "column store health check failed");
                Health::Red
            }
        }
    }

    /// Commit events of every scope on this engine; filter on
    /// [`CommitEvent::scope`] where needed.
    pub fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.shared.events.subscribe()
    }

    pub fn entity_store(&self) -> &EntityVersionStore {
        &self.shared.entities
    }

    pub fn log_store(&self) -> &LogEntryStore {
        &self.shared.logs
    }

    fn check_load_size(&self, requested: usize) -> Result<(), EngineError> {
        let max = self.shared.config.max_load_size;
        if requested > max {
            return Err(EngineError::LoadTooLarge { requested, max });
        }
        Ok(())
    }

    /// Drops uncommitted rows from a newest-first repair window and
    /// validates the payloads of the rows that remain. Only `Partial` rows
    /// need a log lookup.
    async fn visible(
        &self,
        id: &Id,
        rows: Vec<MvccEntity>,
    ) -> Result<Vec<MvccEntity>, EngineError> {
        let committed = try_join_all(rows.iter().map(|row| async move {
            if row.is_complete() {
                Ok(true)
            } else {
                self.is_committed(id, row.version()).await
            }
        }))
        .await?;
        let visible: Vec<MvccEntity> = rows
            .into_iter()
            .zip(committed)
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect();
        for row in &visible {
            check_payload(row)?;
        }
        Ok(visible)
    }

    async fn is_committed(&self, id: &Id, version: Version) -> Result<bool, EngineError> {
        let entry = self.shared.logs.load(&self.scope, id, version).await?;
        Ok(entry.is_some_and(|e| e.version() == version && e.stage() == Stage::Complete))
    }
}

fn page_stream(
    entries: Vec<MvccLogEntry>,
) -> stream::Iter<std::vec::IntoIter<Result<MvccLogEntry, EngineError>>> {
    stream::iter(entries.into_iter().map(Ok).collect::<Vec<_>>())
}
