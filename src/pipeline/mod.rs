//! Staged write and delete pipeline.
//!
//! A write runs `WriteStart -> WritePersist -> WriteCommit`; a delete runs
//! `MarkStart -> MarkPersist -> MarkCommit`. Each stage takes the previous
//! stage's [`CollectionIoEvent`] and can be driven on its own, which is how
//! crashed writes are reproduced in tests.

pub mod event;
pub mod mark;
pub mod write;

pub use event::{CollectionIoEvent, CommitEvent, CommitKind};
pub use mark::{MarkCommit, MarkPersist, MarkStart};
pub use write::{WriteCommit, WritePersist, WriteStart};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{Entity, Id, MvccEntity, MvccLogEntry, Scope, Stage};
use crate::serialization::{EntityVersionStore, LogEntryStore};
use crate::version::{Version, VersionClock};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Started,
    Persisted,
    TombstoneWritten,
    Committed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Started => "started",
            PipelineState::Persisted => "persisted",
            PipelineState::TombstoneWritten => "tombstone_written",
            PipelineState::Committed => "committed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both stage chains, wired to the same clock, stores and event channel.
#[derive(Clone)]
pub struct Pipeline {
    write_start: WriteStart,
    write_persist: WritePersist,
    write_commit: WriteCommit,
    mark_start: MarkStart,
    mark_persist: MarkPersist,
    mark_commit: MarkCommit,
}

impl Pipeline {
    pub fn new(
        clock: Arc<VersionClock>,
        logs: LogEntryStore,
        entities: EntityVersionStore,
        events: broadcast::Sender<CommitEvent>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            write_start: WriteStart::new(clock.clone(), logs.clone(), config.max_entity_size),
            write_persist: WritePersist::new(entities.clone()),
            write_commit: WriteCommit::new(logs.clone(), entities.clone(), events.clone()),
            mark_start: MarkStart::new(clock, logs.clone()),
            mark_persist: MarkPersist::new(entities.clone()),
            mark_commit: MarkCommit::new(logs, entities, events),
        }
    }

    /// Runs the full write chain and returns the entity stamped with its
    /// committed version.
    pub async fn write(&self, scope: &Scope, entity: Entity) -> Result<Entity, EngineError> {
        let started = self
            .write_start
            .call(CollectionIoEvent::new(scope.clone(), entity))
            .await?;
        let persisted = self.write_persist.call(started).await?;
        let committed = self.write_commit.call(persisted).await?;
        Ok(committed.into_parts().1)
    }

    /// Runs the full delete chain and returns the tombstone version.
    pub async fn delete(&self, scope: &Scope, id: Id) -> Result<Version, EngineError> {
        let started = self
            .mark_start
            .call(CollectionIoEvent::new(scope.clone(), id))
            .await?;
        let written = self.mark_persist.call(started).await?;
        let committed = self.mark_commit.call(written).await?;
        Ok(committed.into_parts().1)
    }

    pub fn write_start(&self) -> &WriteStart {
        &self.write_start
    }

    pub fn write_persist(&self) -> &WritePersist {
        &self.write_persist
    }

    pub fn write_commit(&self) -> &WriteCommit {
        &self.write_commit
    }

    pub fn mark_start(&self) -> &MarkStart {
        &self.mark_start
    }

    pub fn mark_persist(&self) -> &MarkPersist {
        &self.mark_persist
    }

    pub fn mark_commit(&self) -> &MarkCommit {
        &self.mark_commit
    }
}

/// Writes the `Active` marker for a freshly issued version.
async fn begin(
    logs: &LogEntryStore,
    scope: &Scope,
    id: &Id,
    version: Version,
) -> Result<(), EngineError> {
    let entry = MvccLogEntry::new(id.clone(), version, Stage::Active);
    logs.write(scope, &entry)
        .await
        .map_err(|e| EngineError::write_failed(PipelineState::Started, Some(version), e))?;
    debug!(scope = %scope, id = %id, version = %version, "pipeline started");
    Ok(())
}

/// Marks the log `Complete`, promotes the content row and publishes the
/// commit. The log write is the commit point: a failed promotion still
/// leaves a committed version, which reads resolve through the log.
async fn commit(
    logs: &LogEntryStore,
    entities: &EntityVersionStore,
    events: &broadcast::Sender<CommitEvent>,
    scope: &Scope,
    entity: &MvccEntity,
    kind: CommitKind,
) -> Result<(), EngineError> {
    let version = entity.version();
    let failed =
        move |e: EngineError| EngineError::write_failed(PipelineState::Committed, Some(version), e);
    let entry = MvccLogEntry::new(entity.id().clone(), version, Stage::Complete);
    logs.write(scope, &entry).await.map_err(failed)?;
    entities
        .write(scope, &entity.promoted())
        .await
        .map_err(failed)?;
    debug!(
        scope = %scope,
        id = %entity.id(),
        version = %version,
        kind = ?kind,
        "pipeline committed"
    );
    // Nobody listening is not an error.
    let _ = events.send(CommitEvent {
        scope: scope.clone(),
        id: entity.id().clone(),
        version,
        kind,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CommitKind, Pipeline, PipelineState};
    use crate::config::EngineConfig;
    use crate::model::{Entity, Id, Scope, Stage, Status, Value};
    use crate::serialization::{EntityVersionStore, LogEntryStore};
    use crate::store::{Fault, MemoryColumnStore, StoreOp, Table};
    use crate::version::{Version, VersionClock};
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use uuid::Uuid;

    struct Harness {
        memory: Arc<MemoryColumnStore>,
        logs: LogEntryStore,
        entities: EntityVersionStore,
        pipeline: Pipeline,
        events: broadcast::Receiver<super::CommitEvent>,
        scope: Scope,
    }

    fn harness(config: EngineConfig) -> Harness {
        let memory = Arc::new(MemoryColumnStore::new());
        let logs = LogEntryStore::new(memory.clone(), &config);
        let entities = EntityVersionStore::new(memory.clone(), &config);
        let (tx, rx) = broadcast::channel(16);
        let pipeline = Pipeline::new(
            Arc::new(VersionClock::new()),
            logs.clone(),
            entities.clone(),
            tx,
            &config,
        );
        Harness {
            memory,
            logs,
            entities,
            pipeline,
            events: rx,
            scope: Scope::new(Uuid::new_v4(), "users"),
        }
    }

    #[tokio::test]
    async fn write_leaves_complete_log_and_row() {
        let mut h = harness(EngineConfig::default());
        let id = Id::new("user");
        let written = h
            .pipeline
            .write(&h.scope, Entity::new(id.clone()).with_field("name", "a"))
            .await
            .expect("write");
        let version = written.version().expect("stamped");

        let log = h
            .logs
            .load(&h.scope, &id, Version::MAX)
            .await
            .expect("log")
            .expect("present");
        assert_eq!(log.version(), version);
        assert_eq!(log.stage(), Stage::Complete);

        let row = h.entities.load_version(&h.scope, &id, version).await.expect("row");
        assert_eq!(row.status(), Status::Complete);
        assert_eq!(
            row.payload().and_then(|p| p.field("name")),
            Some(&Value::from("a"))
        );

        let event = h.events.recv().await.expect("event");
        assert_eq!(event.version, version);
        assert_eq!(event.kind, CommitKind::Write);
    }

    #[tokio::test]
    async fn delete_writes_a_tombstone() {
        let mut h = harness(EngineConfig::default());
        let id = Id::new("user");
        let version = h.pipeline.delete(&h.scope, id.clone()).await.expect("delete");
        let row = h.entities.load_version(&h.scope, &id, version).await.expect("row");
        assert!(row.is_tombstone());
        assert!(row.is_complete());
        assert_eq!(h.events.recv().await.expect("event").kind, CommitKind::Delete);
    }

    #[tokio::test]
    async fn start_failure_writes_nothing() {
        let h = harness(EngineConfig::default());
        h.memory
            .inject(Fault::unavailable().on_table(Table::EntityLog).on_op(StoreOp::Put));
        let err = h
            .pipeline
            .write(&h.scope, Entity::new(Id::new("user")).with_field("name", "a"))
            .await
            .expect_err("start fails");
        assert!(matches!(
            err,
            crate::error::EngineError::WriteFailed {
                state: PipelineState::Started,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert_eq!(h.memory.cell_count(Table::EntityLog), 0);
        assert_eq!(h.memory.cell_count(Table::EntityVersionData), 0);
    }

    #[tokio::test]
    async fn persist_failure_leaves_only_an_active_marker() {
        let h = harness(EngineConfig::default());
        h.memory.inject(
            Fault::unavailable()
                .on_table(Table::EntityVersionData)
                .on_op(StoreOp::Put),
        );
        let id = Id::new("user");
        let err = h
            .pipeline
            .write(&h.scope, Entity::new(id.clone()).with_field("name", "a"))
            .await
            .expect_err("persist fails");
        assert!(matches!(
            err,
            crate::error::EngineError::WriteFailed {
                state: PipelineState::Persisted,
                version: Some(_),
                ..
            }
        ));
        let log = h
            .logs
            .load(&h.scope, &id, Version::MAX)
            .await
            .expect("log")
            .expect("present");
        assert_eq!(log.stage(), Stage::Active);
        assert_eq!(h.memory.cell_count(Table::EntityVersionData), 0);
    }

    #[tokio::test]
    async fn oversized_payloads_are_rejected_before_any_write() {
        let h = harness(EngineConfig::default().with_max_entity_size(16));
        let err = h
            .pipeline
            .write(
                &h.scope,
                Entity::new(Id::new("user")).with_field("bio", "x".repeat(64)),
            )
            .await
            .expect_err("too large");
        assert_eq!(err.code_str(), "entity_too_large");
        assert_eq!(h.memory.cell_count(Table::EntityLog), 0);
    }

    #[tokio::test]
    async fn invalid_identity_is_rejected() {
        let h = harness(EngineConfig::default());
        let err = h
            .pipeline
            .delete(&h.scope, Id::from_parts(Uuid::nil(), "user"))
            .await
            .expect_err("nil uuid");
        assert_eq!(err.code_str(), "validation");
    }
}
