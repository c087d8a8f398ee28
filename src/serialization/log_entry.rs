use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{Id, MvccLogEntry, Scope, Stage, VersionSet};
use crate::serialization::{bounded, require_limit};
use crate::store::codec::{decode_stage, encode_stage};
use crate::store::{Cell, ColumnStore, RowKey, Table};
use crate::version::Version;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const TABLE: Table = Table::EntityLog;

/// Persists and reads per-`(id, version)` stage markers.
///
/// Pure persistence: every store error is returned to the caller unchanged.
#[derive(Clone)]
pub struct LogEntryStore {
    store: Arc<dyn ColumnStore>,
    timeout: Duration,
    active_ttl: Option<Duration>,
    page_size: usize,
    max_load_size: usize,
}

impl LogEntryStore {
    pub fn new(store: Arc<dyn ColumnStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout(),
            active_ttl: config.active_log_ttl(),
            page_size: config.log_buffer_size,
            max_load_size: config.max_load_size,
        }
    }

    /// Idempotent: rewriting the same marker leaves the row unchanged.
    pub async fn write(&self, scope: &Scope, entry: &MvccLogEntry) -> Result<(), EngineError> {
        let row = RowKey::for_entity(scope, entry.id());
        let value = encode_stage(entry)?;
        let ttl = if entry.stage().is_transient() {
            self.active_ttl
        } else {
            None
        };
        debug!(
            id = %entry.id(),
            version = %entry.version(),
            stage = ?entry.stage(),
            "writing log entry"
        );
        bounded(
            self.timeout,
            "log_entry.write",
            self.store.put(TABLE, &row, entry.version(), value, ttl),
        )
        .await
    }

    /// Newest marker at or below `max_version`.
    pub async fn load(
        &self,
        scope: &Scope,
        id: &Id,
        max_version: Version,
    ) -> Result<Option<MvccLogEntry>, EngineError> {
        Ok(self
            .load_range(scope, id, max_version, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Markers at or below `max_version`, newest first.
    pub async fn load_range(
        &self,
        scope: &Scope,
        id: &Id,
        max_version: Version,
        limit: usize,
    ) -> Result<Vec<MvccLogEntry>, EngineError> {
        require_limit(limit)?;
        let row = RowKey::for_entity(scope, id);
        let cells = bounded(
            self.timeout,
            "log_entry.load_range",
            self.store.scan_descending(TABLE, &row, max_version, limit),
        )
        .await?;
        decode_cells(id, cells)
    }

    /// Markers at or above `min_version`, oldest first.
    pub async fn load_history(
        &self,
        scope: &Scope,
        id: &Id,
        min_version: Version,
        limit: usize,
    ) -> Result<Vec<MvccLogEntry>, EngineError> {
        require_limit(limit)?;
        let row = RowKey::for_entity(scope, id);
        let cells = bounded(
            self.timeout,
            "log_entry.load_history",
            self.store.scan_ascending(TABLE, &row, min_version, limit),
        )
        .await?;
        decode_cells(id, cells)
    }

    /// Newest `Complete` marker at or below `max_version`, paging past any
    /// `Active` markers left by in-flight or crashed writes.
    pub async fn load_latest_complete(
        &self,
        scope: &Scope,
        id: &Id,
        max_version: Version,
    ) -> Result<Option<MvccLogEntry>, EngineError> {
        let mut upper = max_version;
        loop {
            let page = self.load_range(scope, id, upper, self.page_size).await?;
            let exhausted = page.len() < self.page_size;
            let Some(last) = page.last().map(MvccLogEntry::version) else {
                return Ok(None);
            };
            if let Some(found) = page.into_iter().find(|e| e.stage() == Stage::Complete) {
                return Ok(Some(found));
            }
            if exhausted {
                return Ok(None);
            }
            match predecessor(last) {
                Some(prev) => upper = prev,
                None => return Ok(None),
            }
        }
    }

    pub async fn load_latest_many(
        &self,
        scope: &Scope,
        ids: &[Id],
        max_version: Version,
    ) -> Result<VersionSet, EngineError> {
        if ids.len() > self.max_load_size {
            return Err(EngineError::LoadTooLarge {
                requested: ids.len(),
                max: self.max_load_size,
            });
        }
        let found = try_join_all(
            ids.iter()
                .map(|id| self.load_latest_complete(scope, id, max_version)),
        )
        .await?;
        let mut set = VersionSet::with_capacity(ids.len());
        for entry in found.into_iter().flatten() {
            set.insert(entry);
        }
        Ok(set)
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
            "log_entry.delete",
            self.store.delete(TABLE, &row, version),
        )
        .await
    }
}

fn decode_cells(id: &Id, cells: Vec<Cell>) -> Result<Vec<MvccLogEntry>, EngineError> {
    cells
        .into_iter()
        .map(|cell| decode_stage(id, cell.column, &cell.value))
        .collect()
}

/// Largest version strictly below `version`.
pub(crate) fn predecessor(version: Version) -> Option<Version> {
    version.as_u128().checked_sub(1).map(Version::from_u128)
}

/// Smallest version strictly above `version`.
pub(crate) fn successor(version: Version) -> Option<Version> {
    version.as_u128().checked_add(1).map(Version::from_u128)
}
