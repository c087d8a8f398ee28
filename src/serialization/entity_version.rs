use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{Id, MvccEntity, Scope, Status};
use crate::serialization::{bounded, require_limit};
use crate::store::codec::{decode_entity, decode_entity_unchecked, encode_entity};
use crate::store::{ColumnStore, RowKey, Table};
use crate::version::Version;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const TABLE: Table = Table::EntityVersionData;

/// Persists and reads versioned entity content.
///
/// Rows are append-only: a second write of an existing `(id, version)` is
/// accepted only when it carries the same content, and may then only move
/// the row from `Partial` to `Complete`.
#[derive(Clone)]
pub struct EntityVersionStore {
    store: Arc<dyn ColumnStore>,
    timeout: Duration,
}

impl EntityVersionStore {
    pub fn new(store: Arc<dyn ColumnStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout(),
        }
    }

    pub async fn write(&self, scope: &Scope, entity: &MvccEntity) -> Result<(), EngineError> {
        let row = RowKey::for_entity(scope, entity.id());
        let existing = bounded(
            self.timeout,
            "entity_version.read_before_write",
            self.store.get(TABLE, &row, entity.version()),
        )
        .await?;
        if let Some(bytes) = existing {
            let current = decode_entity(entity.id(), entity.version(), &bytes)?;
            let same_content = current.is_cleared() == entity.is_cleared()
                && match (current.payload(), entity.payload()) {
                    (Some(a), Some(b)) => a.same_payload(b),
                    (None, None) => true,
                    _ => false,
                };
            if !same_content {
                return Err(EngineError::VersionConflict {
                    id: entity.id().clone(),
                    version: entity.version(),
                });
            }
            if current.status() == Status::Complete || current.status() == entity.status() {
                debug!(
                    id = %entity.id(),
                    version = %entity.version(),
                    "entity row already written"
                );
                return Ok(());
            }
        }
        let value = encode_entity(entity)?;
        debug!(
            id = %entity.id(),
            version = %entity.version(),
            status = ?entity.status(),
            tombstone = entity.is_tombstone(),
            "writing entity row"
        );
        bounded(
            self.timeout,
            "entity_version.write",
            self.store.put(TABLE, &row, entity.version(), value, None),
        )
        .await
    }

    /// Newest row at or below `max_version`.
    pub async fn load(
        &self,
        scope: &Scope,
        id: &Id,
        max_version: Version,
    ) -> Result<Option<MvccEntity>, EngineError> {
        Ok(self
            .load_range(scope, id, max_version, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Rows at or below `max_version`, newest first.
    pub async fn load_range(
        &self,
        scope: &Scope,
        id: &Id,
        max_version: Version,
        limit: usize,
    ) -> Result<Vec<MvccEntity>, EngineError> {
        require_limit(limit)?;
        let row = RowKey::for_entity(scope, id);
        let cells = bounded(
            self.timeout,
            "entity_version.load_range",
            self.store.scan_descending(TABLE, &row, max_version, limit),
        )
        .await?;
        cells
            .into_iter()
            .map(|cell| decode_entity(id, cell.column, &cell.value))
            .collect()
    }

    /// Newest-first rows at or below `max_version`, ending at the first
    /// `Complete` row with content. At most `limit` versions are scanned.
    ///
    /// Rows are decoded one at a time and nothing past that base is decoded.
    /// Payloads are left unvalidated; callers check the rows they use.
    pub(crate) async fn load_repair_window(
        &self,
        scope: &Scope,
        id: &Id,
        max_version: Version,
        limit: usize,
    ) -> Result<Vec<MvccEntity>, EngineError> {
        require_limit(limit)?;
        let row = RowKey::for_entity(scope, id);
        let cells = bounded(
            self.timeout,
            "entity_version.load_repair_window",
            self.store.scan_descending(TABLE, &row, max_version, limit),
        )
        .await?;
        let mut window = Vec::new();
        for cell in cells {
            let entity = decode_entity_unchecked(id, cell.column, &cell.value)?;
            let is_base = entity.is_complete() && entity.payload().is_some();
            window.push(entity);
            if is_base {
                break;
            }
        }
        Ok(window)
    }

    /// Rows at or above `min_version`, oldest first.
    pub async fn load_history(
        &self,
        scope: &Scope,
        id: &Id,
        min_version: Version,
        limit: usize,
    ) -> Result<Vec<MvccEntity>, EngineError> {
        require_limit(limit)?;
        let row = RowKey::for_entity(scope, id);
        let cells = bounded(
            self.timeout,
            "entity_version.load_history",
            self.store.scan_ascending(TABLE, &row, min_version, limit),
        )
        .await?;
        cells
            .into_iter()
            .map(|cell| decode_entity(id, cell.column, &cell.value))
            .collect()
    }

    /// Exact row lookup. Missing or cleared rows are `VersionNotFound`.
    pub async fn load_version(
        &self,
        scope: &Scope,
        id: &Id,
        version: Version,
    ) -> Result<MvccEntity, EngineError> {
        let row = RowKey::for_entity(scope, id);
        let bytes = bounded(
            self.timeout,
            "entity_version.load_version",
            self.store.get(TABLE, &row, version),
        )
        .await?;
        let not_found = || EngineError::VersionNotFound {
            id: id.clone(),
            version,
        };
        let entity = decode_entity(id, version, &bytes.ok_or_else(not_found)?)?;
        if entity.is_cleared() {
            return Err(not_found());
        }
        Ok(entity)
    }

    /// Drops the payload of one existing version but keeps the row, so
    /// history stays contiguous. The row keeps its status; a missing row is
    /// `VersionNotFound`.
    pub async fn clear(&self, scope: &Scope, id: &Id, version: Version) -> Result<(), EngineError> {
        let row = RowKey::for_entity(scope, id);
        let existing = bounded(
            self.timeout,
            "entity_version.read_before_clear",
            self.store.get(TABLE, &row, version),
        )
        .await?
        .ok_or_else(|| EngineError::VersionNotFound {
            id: id.clone(),
            version,
        })?;
        // A malformed payload is still clearable.
        let current = decode_entity_unchecked(id, version, &existing)?;
        if current.is_cleared() {
            return Ok(());
        }
        let value = encode_entity(&MvccEntity::cleared(id.clone(), version, current.status()))?;
        bounded(
            self.timeout,
            "entity_version.clear",
            self.store.put(TABLE, &row, version, value, None),
        )
        .await
    }

    pub async fn delete(
        &self,
        scope: &Scope,
        id: &Id,
        version: Version,
    ) -> Result<(), EngineError> {
        let row = RowKey::for_entity(scope, id);
        bounded(
            self.timeout,
            "entity_version.delete",
            self.store.delete(TABLE, &row, version),
        )
        .await
    }
}
