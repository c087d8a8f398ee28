use crate::error::EngineError;
use crate::model::value::validate_fields;
use crate::model::{Entity, MvccEntity, Status};
use crate::pipeline::event::{CollectionIoEvent, CommitEvent, CommitKind};
use crate::pipeline::{PipelineState, begin, commit};
use crate::serialization::{EntityVersionStore, LogEntryStore};
use crate::store::codec::payload_size;
use crate::version::VersionClock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Validates the candidate payload, issues a version and records intent.
#[derive(Clone)]
pub struct WriteStart {
    clock: Arc<VersionClock>,
    logs: LogEntryStore,
    max_entity_size: usize,
}

impl WriteStart {
    pub fn new(clock: Arc<VersionClock>, logs: LogEntryStore, max_entity_size: usize) -> Self {
        Self {
            clock,
            logs,
            max_entity_size,
        }
    }

    pub async fn call(
        &self,
        input: CollectionIoEvent<Entity>,
    ) -> Result<CollectionIoEvent<MvccEntity>, EngineError> {
        let (scope, entity) = input.into_parts();
        scope.validate()?;
        entity.id().validate()?;
        validate_fields(entity.fields()).map_err(EngineError::Validation)?;
        let size = payload_size(entity.fields())?;
        if size > self.max_entity_size {
            return Err(EngineError::EntityTooLarge {
                size,
                max: self.max_entity_size,
            });
        }

        let version = self.clock.next();
        let id = entity.id().clone();
        begin(&self.logs, &scope, &id, version).await?;
        Ok(CollectionIoEvent::new(
            scope,
            MvccEntity::new(id, version, Status::Partial, Some(entity)),
        ))
    }
}

/// Persists the content row as `Partial`.
#[derive(Clone)]
pub struct WritePersist {
    entities: EntityVersionStore,
}

impl WritePersist {
    pub fn new(entities: EntityVersionStore) -> Self {
        Self { entities }
    }

    pub async fn call(
        &self,
        input: CollectionIoEvent<MvccEntity>,
    ) -> Result<CollectionIoEvent<MvccEntity>, EngineError> {
        let entity = input.event();
        self.entities
            .write(input.scope(), entity)
            .await
            .map_err(|e| {
                EngineError::write_failed(PipelineState::Persisted, Some(entity.version()), e)
            })?;
        debug!(
            scope = %input.scope(),
            id = %entity.id(),
            version = %entity.version(),
            "pipeline persisted"
        );
        Ok(input)
    }
}

/// Commits the version and hands back the stamped entity.
#[derive(Clone)]
pub struct WriteCommit {
    logs: LogEntryStore,
    entities: EntityVersionStore,
    events: broadcast::Sender<CommitEvent>,
}

impl WriteCommit {
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
    ) -> Result<CollectionIoEvent<Entity>, EngineError> {
        commit(
            &self.logs,
            &self.entities,
            &self.events,
            input.scope(),
            input.event(),
            CommitKind::Write,
        )
        .await?;
        let id = input.event().id().clone();
        Ok(input.map(|entity| {
            entity
                .into_payload()
                .unwrap_or_else(|| Entity::new(id))
        }))
    }
}
