use crate::model::entity::Entity;
use crate::model::id::Id;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Complete,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Active,
    Complete,
}

impl Stage {
    /// Active markers may expire; Complete markers are permanent.
    pub fn is_transient(self) -> bool {
        matches!(self, Stage::Active)
    }
}

/// One immutable `(id, version)` row of entity content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvccEntity {
    id: Id,
    version: Version,
    status: Status,
    payload: Option<Entity>,
    cleared: bool,
}

impl MvccEntity {
    pub fn new(id: Id, version: Version, status: Status, payload: Option<Entity>) -> Self {
        let payload = payload.map(|entity| {
            Entity::from_fields(id.clone(), entity.into_fields()).with_version(version)
        });
        Self {
            id,
            version,
            status,
            payload,
            cleared: false,
        }
    }

    pub fn tombstone(id: Id, version: Version, status: Status) -> Self {
        Self::new(id, version, status, None)
    }

    /// Row whose payload was reclaimed. `status` is the status the row had
    /// before clearing.
    pub(crate) fn cleared(id: Id, version: Version, status: Status) -> Self {
        Self {
            id,
            version,
            status,
            payload: None,
            cleared: true,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn payload(&self) -> Option<&Entity> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<Entity> {
        self.payload
    }

    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    /// No payload: a delete marker or content reclaimed by `clear`.
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_none()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub(crate) fn promoted(&self) -> Self {
        Self {
            status: Status::Complete,
            ..self.clone()
        }
    }
}

/// Stage marker for one `(id, version)` write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MvccLogEntry {
    id: Id,
    version: Version,
    stage: Stage,
}

impl MvccLogEntry {
    pub fn new(id: Id, version: Version, stage: Stage) -> Self {
        Self { id, version, stage }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

/// Newest Complete log entry per id, as returned by latest-version lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSet {
    entries: HashMap<Id, MvccLogEntry>,
}

impl VersionSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, entry: MvccLogEntry) {
        self.entries.insert(entry.id().clone(), entry);
    }

    pub fn max_version(&self, id: &Id) -> Option<&MvccLogEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MvccLogEntry> {
        self.entries.values()
    }
}
