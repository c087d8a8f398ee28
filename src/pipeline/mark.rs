use crate::error::EngineError;
use crate::model::{Id, MvccEntity, Status};
use crate::pipeline::event::{CollectionIoEvent, CommitEvent, CommitKind};
use crate::pipeline::{PipelineState, begin, commit};
use crate::serialization::{EntityVersionStore, LogEntryStore};
use crate::version::{Version, VersionClock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Issues a version for a delete and records intent.
#[derive(Clone)]
pub struct MarkStart {
    clock: Arc<VersionClock>,
    logs: LogEntryStore,
}

impl MarkStart {
    pub fn new(clock: Arc<VersionClock>, logs: LogEntryStore) -> Self {
        Self { clock, logs }
    }

    pub async fn call(
        &self,
        input: CollectionIoEvent<Id>,
    ) -> Result<CollectionIoEvent<MvccEntity>, EngineError> {
        let (scope, id) = input.into_parts();
        scope.validate()?;
        id.validate()?;
        let version = self.clock.next();
        begin(&self.logs, &scope, &id, version).await?;
        Ok(CollectionIoEvent::new(
            scope,
            MvccEntity::tombstone(id, version, Status::Partial),
        ))
    }
}

/// Persists the `Partial` tombstone row.
#[derive(Clone)]
pub struct MarkPersist {
    entities: EntityVersionStore,
}

impl MarkPersist {
    pub fn new(entities: EntityVersionStore) -> Self {
        Self { entities }
    }

    pub async fn call(
        &self,
        input: CollectionIoEvent<MvccEntity>,
    ) -> Result<CollectionIoEvent<MvccEntity>, EngineError> {
        let tombstone = input.event();
        self.entities
            .write(input.scope(), tombstone)
            .await
            .map_err(|e| {
                EngineError::write_failed(
                    PipelineState::TombstoneWritten,
                    Some(tombstone.version()),
                    e,
                )
            })?;
        debug!(
            scope = %input.scope(),
            id = %tombstone.id(),
            version = %tombstone.version(),
            "pipeline tombstone written"
        );
        Ok(input)
    }
}

#[derive(Clone)]
pub struct MarkCommit {
    logs: LogEntryStore,
    entities: EntityVersionStore,
    events: broadcast::Sender<CommitEvent>,
}

impl MarkCommit {
    pub fn new(
        logs: LogEntryStore,
        entities: EntityVersionStore,
        events: broadcast::Sender<CommitEvent>,
    ) -> Self {
        Self {
            logs,
            entities,
            events,
        }
    }

    pub async fn call(
        &self,
        input: CollectionIoEvent<MvccEntity>,
    ) -> Result<CollectionIoEvent<Version>, EngineError> {
        commit(
            &self.logs,
            &self.entities,
            &self.events,
            input.scope(),
            input.event(),
            CommitKind::Delete,
        )
        .await?;
        Ok(input.map(|tombstone| tombstone.version()))
    }
}
